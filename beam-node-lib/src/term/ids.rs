//! Node-qualified identifiers: process ids, ports, and references.
//!
//! All three carry a `creation` counter distinguishing successive
//! incarnations of the same node identity, and compare/hash structurally
//! over every field rather than by any notion of object identity.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    pub node: String,
    pub num: u32,
    pub serial: u32,
    pub creation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Port {
    pub node: String,
    pub id: u64,
    pub creation: u32,
}

/// One or more 32-bit words of reference entropy, in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub node: String,
    pub creation: u32,
    pub ids: Vec<u32>,
}
