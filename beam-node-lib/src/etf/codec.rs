//! Encode/decode of [`Term`] to and from External Term Format bytes.
//!
//! Tag dispatch on decode treats several wire tags as equivalent (see the
//! module-level table in the design doc); encode always picks the
//! narrowest legal representation.

use crate::term::{Fun, Pid, Port, Reference, Term};

use super::buffer::Buffer;
use super::error::{DecodingError, EncodingError};
use super::tags;

/// Encode `term` onto the end of `buf`, without touching any version byte
/// `buf` may already carry.
pub fn encode(term: &Term, buf: &mut Buffer) -> Result<(), EncodingError> {
    match term {
        Term::Int(n) => encode_int(*n, buf),
        Term::Float(x) => encode_float(*x, buf),
        Term::Atom(name) => encode_atom(name, buf)?,
        Term::String(s) => encode_string(s, buf)?,
        Term::Binary(bytes) => encode_binary(bytes, buf),
        Term::Bitstring(bytes, trailing) => encode_bitstring(bytes, *trailing, buf)?,
        Term::Tuple(items) => encode_tuple(items, buf)?,
        Term::List(items) => encode_list(items, buf)?,
        Term::Map(pairs) => encode_map(pairs, buf)?,
        Term::Pid(pid) => encode_pid(pid, buf)?,
        Term::Port(port) => encode_port(port, buf)?,
        Term::Reference(r) => encode_reference(r, buf)?,
        Term::Fun(fun) => encode_fun(fun, buf)?,
    }
    Ok(())
}

/// Decode exactly one term starting at the buffer's current read cursor.
pub fn decode(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_tag()?;
    match tag {
        tags::SMALL_INTEGER | tags::INTEGER | tags::SMALL_BIG | tags::LARGE_BIG => decode_int(buf),
        tags::NEW_FLOAT | tags::FLOAT_EXT => decode_float(buf),
        tags::ATOM | tags::SMALL_ATOM | tags::ATOM_UTF8 | tags::SMALL_ATOM_UTF8 => {
            decode_atom(buf)
        }
        tags::NEW_REFERENCE | tags::NEWER_REFERENCE | tags::REFERENCE => decode_reference(buf),
        tags::NEW_PID | tags::PID => decode_pid(buf),
        tags::NEW_PORT | tags::PORT => decode_port(buf),
        tags::SMALL_TUPLE | tags::LARGE_TUPLE => decode_tuple(buf),
        tags::STRING => decode_string(buf),
        tags::LIST | tags::NIL => decode_list(buf),
        tags::BINARY => decode_binary(buf),
        tags::BIT_BINARY => decode_bitstring(buf),
        tags::NEW_FUN | tags::EXPORT | tags::FUN => decode_fun(buf),
        tags::MAP => decode_map(buf),
        other => Err(DecodingError::UnknownTag(other)),
    }
}

fn encode_int(n: i64, buf: &mut Buffer) {
    if (0..=255).contains(&n) {
        buf.append_byte(tags::SMALL_INTEGER);
        buf.append_byte(n as u8);
    } else if (i32::MIN as i64..=i32::MAX as i64).contains(&n) {
        buf.append_byte(tags::INTEGER);
        buf.append_bytes(&(n as i32).to_be_bytes());
    } else {
        buf.append_byte(tags::SMALL_BIG);
        let sign: u8 = u8::from(n < 0);
        let mag = n.unsigned_abs();
        let mut bytes = mag.to_le_bytes().to_vec();
        while bytes.len() > 1 && *bytes.last().unwrap() == 0 {
            bytes.pop();
        }
        buf.append_byte(bytes.len() as u8);
        buf.append_byte(sign);
        buf.append_bytes(&bytes);
    }
}

fn decode_int(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let value = match tag {
        tags::SMALL_INTEGER => buf.read_u8()? as i64,
        tags::INTEGER => buf.read_i32()? as i64,
        tags::SMALL_BIG => {
            let n = buf.read_u8()? as usize;
            let sign = buf.read_u8()?;
            decode_big_magnitude(buf, n, sign)?
        }
        tags::LARGE_BIG => {
            let n = buf.read_u32()? as usize;
            let sign = buf.read_u8()?;
            decode_big_magnitude(buf, n, sign)?
        }
        other => return Err(DecodingError::UnknownTag(other)),
    };
    Ok(Term::Int(value))
}

/// Big integers are stored little-endian, sign/magnitude. We only expose
/// `i64`, so magnitudes wider than 8 significant bytes are truncated to
/// their low 64 bits rather than rejected outright.
fn decode_big_magnitude(buf: &mut Buffer, n: usize, sign: u8) -> Result<i64, DecodingError> {
    let bytes = buf.read_bytes(n)?;
    let mut mag: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate().take(8) {
        mag |= (byte as u64) << (i * 8);
    }
    let value = mag as i64;
    Ok(if sign != 0 { value.wrapping_neg() } else { value })
}

fn encode_float(x: f64, buf: &mut Buffer) {
    buf.append_byte(tags::NEW_FLOAT);
    buf.append_bytes(&x.to_be_bytes());
}

fn decode_float(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let value = if tag == tags::NEW_FLOAT {
        buf.read_f64()?
    } else {
        let bytes = buf.read_bytes(31)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..end])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(DecodingError::BadTerm("invalid FLOAT_EXT ascii payload"))?
    };
    Ok(Term::Float(value))
}

fn encode_atom(name: &str, buf: &mut Buffer) -> Result<(), EncodingError> {
    let bytes = name.as_bytes();
    if bytes.len() <= 255 {
        buf.append_byte(tags::SMALL_ATOM_UTF8);
        buf.append_byte(bytes.len() as u8);
        buf.append_bytes(bytes);
        Ok(())
    } else if bytes.len() <= u16::MAX as usize {
        buf.append_byte(tags::ATOM_UTF8);
        buf.append_bytes(&(bytes.len() as u16).to_be_bytes());
        buf.append_bytes(bytes);
        Ok(())
    } else {
        Err(EncodingError::AtomTooLong(name.to_string()))
    }
}

fn decode_atom(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let len = match tag {
        tags::ATOM | tags::ATOM_UTF8 => buf.read_u16()? as usize,
        tags::SMALL_ATOM | tags::SMALL_ATOM_UTF8 => buf.read_u8()? as usize,
        other => return Err(DecodingError::UnknownTag(other)),
    };
    let bytes = buf.read_bytes(len)?;
    Ok(Term::Atom(String::from_utf8_lossy(bytes).into_owned()))
}

/// Strings (charlist shorthand) round-trip as STRING only when every
/// element fits a byte; callers needing arbitrary code points should use
/// `Term::List` of `Term::Int` directly.
fn encode_string(s: &str, buf: &mut Buffer) -> Result<(), EncodingError> {
    let bytes: Vec<u8> = s.chars().map(|c| c as u32).try_fold(
        Vec::with_capacity(s.len()),
        |mut acc, cp| {
            if cp <= 255 {
                acc.push(cp as u8);
                Some(acc)
            } else {
                None
            }
        },
    ).ok_or(EncodingError::StringTooLong(s.chars().count()))?;
    if bytes.len() > u16::MAX as usize {
        return Err(EncodingError::StringTooLong(bytes.len()));
    }
    buf.append_byte(tags::STRING);
    buf.append_bytes(&(bytes.len() as u16).to_be_bytes());
    buf.append_bytes(&bytes);
    Ok(())
}

fn decode_string(buf: &mut Buffer) -> Result<Term, DecodingError> {
    buf.read_u8()?; // tag
    let len = buf.read_u16()? as usize;
    let bytes = buf.read_bytes(len)?;
    Ok(Term::String(
        bytes.iter().map(|&b| b as char).collect::<String>(),
    ))
}

fn encode_binary(bytes: &[u8], buf: &mut Buffer) {
    buf.append_byte(tags::BINARY);
    buf.append_bytes(&(bytes.len() as u32).to_be_bytes());
    buf.append_bytes(bytes);
}

fn decode_binary(buf: &mut Buffer) -> Result<Term, DecodingError> {
    buf.read_u8()?;
    let len = buf.read_u32()? as usize;
    let bytes = buf.read_bytes(len)?.to_vec();
    Ok(Term::Binary(bytes))
}

/// Only byte-aligned bitstrings (`trailing == 0`) are supported; anything
/// else is rejected per the documented restriction on nonzero bit offsets.
fn encode_bitstring(bytes: &[u8], trailing: u8, buf: &mut Buffer) -> Result<(), EncodingError> {
    if trailing != 0 {
        return Err(EncodingError::InvalidTrailingBits(trailing));
    }
    buf.append_byte(tags::BIT_BINARY);
    buf.append_bytes(&(bytes.len() as u32).to_be_bytes());
    buf.append_byte(8);
    buf.append_bytes(bytes);
    Ok(())
}

fn decode_bitstring(buf: &mut Buffer) -> Result<Term, DecodingError> {
    buf.read_u8()?;
    let len = buf.read_u32()? as usize;
    let bits = buf.read_u8()?;
    let bytes = buf.read_bytes(len)?.to_vec();
    if bits != 8 {
        return Err(DecodingError::UnsupportedBitOffset(bits));
    }
    Ok(Term::Bitstring(bytes, 0))
}

fn encode_tuple(items: &[Term], buf: &mut Buffer) -> Result<(), EncodingError> {
    if items.len() <= 255 {
        buf.append_byte(tags::SMALL_TUPLE);
        buf.append_byte(items.len() as u8);
    } else {
        buf.append_byte(tags::LARGE_TUPLE);
        buf.append_bytes(&(items.len() as u32).to_be_bytes());
    }
    for item in items {
        encode(item, buf)?;
    }
    Ok(())
}

fn decode_tuple(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let arity = if tag == tags::SMALL_TUPLE {
        buf.read_u8()? as usize
    } else {
        buf.read_u32()? as usize
    };
    let mut items = Vec::with_capacity(arity);
    for _ in 0..arity {
        items.push(decode(buf)?);
    }
    Ok(Term::Tuple(items))
}

fn encode_list(items: &[Term], buf: &mut Buffer) -> Result<(), EncodingError> {
    if items.is_empty() {
        buf.append_byte(tags::NIL);
        return Ok(());
    }
    buf.append_byte(tags::LIST);
    buf.append_bytes(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode(item, buf)?;
    }
    buf.append_byte(tags::NIL);
    Ok(())
}

fn decode_list(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    if tag == tags::NIL {
        return Ok(Term::List(Vec::new()));
    }
    let len = buf.read_u32()? as usize;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        items.push(decode(buf)?);
    }
    let tail_tag = buf.read_tag()?;
    if tail_tag != tags::NIL {
        return Err(DecodingError::MissingListEnd);
    }
    buf.read_u8()?;
    Ok(Term::List(items))
}

fn encode_map(pairs: &[(Term, Term)], buf: &mut Buffer) -> Result<(), EncodingError> {
    buf.append_byte(tags::MAP);
    buf.append_bytes(&(pairs.len() as u32).to_be_bytes());
    for (key, value) in pairs {
        encode(key, buf)?;
        encode(value, buf)?;
    }
    Ok(())
}

fn decode_map(buf: &mut Buffer) -> Result<Term, DecodingError> {
    buf.read_u8()?;
    let arity = buf.read_u32()? as usize;
    let mut pairs = Vec::with_capacity(arity);
    for _ in 0..arity {
        let key = decode(buf)?;
        let value = decode(buf)?;
        pairs.push((key, value));
    }
    Ok(Term::Map(pairs))
}

fn encode_pid(pid: &Pid, buf: &mut Buffer) -> Result<(), EncodingError> {
    buf.append_byte(tags::NEW_PID);
    encode_atom(&pid.node, buf)?;
    buf.append_bytes(&pid.num.to_be_bytes());
    buf.append_bytes(&pid.serial.to_be_bytes());
    buf.append_bytes(&pid.creation.to_be_bytes());
    Ok(())
}

fn decode_pid(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let node = decode_atom_name(buf)?;
    let num = buf.read_u32()?;
    let serial = buf.read_u32()?;
    let creation = if tag == tags::NEW_PID {
        buf.read_u32()?
    } else {
        buf.read_u8()? as u32
    };
    Ok(Term::Pid(Pid {
        node,
        num,
        serial,
        creation,
    }))
}

fn encode_port(port: &Port, buf: &mut Buffer) -> Result<(), EncodingError> {
    buf.append_byte(tags::NEW_PORT);
    encode_atom(&port.node, buf)?;
    buf.append_bytes(&(port.id as u32).to_be_bytes());
    buf.append_bytes(&port.creation.to_be_bytes());
    Ok(())
}

fn decode_port(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    let node = decode_atom_name(buf)?;
    let id = buf.read_u32()? as u64;
    let creation = if tag == tags::NEW_PORT {
        buf.read_u32()?
    } else {
        buf.read_u8()? as u32
    };
    Ok(Term::Port(Port {
        node,
        id,
        creation,
    }))
}

fn encode_reference(r: &Reference, buf: &mut Buffer) -> Result<(), EncodingError> {
    buf.append_byte(tags::NEWER_REFERENCE);
    buf.append_bytes(&(r.ids.len() as u16).to_be_bytes());
    encode_atom(&r.node, buf)?;
    buf.append_bytes(&r.creation.to_be_bytes());
    for id in &r.ids {
        buf.append_bytes(&id.to_be_bytes());
    }
    Ok(())
}

fn decode_reference(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_u8()?;
    if tag == tags::REFERENCE {
        let node = decode_atom_name(buf)?;
        let id = buf.read_u32()?;
        let creation = buf.read_u8()? as u32;
        return Ok(Term::Reference(Reference {
            node,
            creation,
            ids: vec![id],
        }));
    }
    let len = buf.read_u16()? as usize;
    let node = decode_atom_name(buf)?;
    let creation = if tag == tags::NEWER_REFERENCE {
        buf.read_u32()?
    } else {
        buf.read_u8()? as u32
    };
    let mut ids = Vec::with_capacity(len);
    for _ in 0..len {
        ids.push(buf.read_u32()?);
    }
    Ok(Term::Reference(Reference {
        node,
        creation,
        ids,
    }))
}

/// Export funs encode; closures cannot be synthesized by client code, so
/// attempting to encode one is an error.
fn encode_fun(fun: &Fun, buf: &mut Buffer) -> Result<(), EncodingError> {
    match fun {
        Fun::Export {
            module,
            function,
            arity,
        } => {
            buf.append_byte(tags::EXPORT);
            encode_atom(module, buf)?;
            encode_atom(function, buf)?;
            encode_int(*arity as i64, buf);
            Ok(())
        }
        Fun::Closure { .. } => Err(EncodingError::UnsupportedFun),
    }
}

fn decode_fun(buf: &mut Buffer) -> Result<Term, DecodingError> {
    let tag = buf.read_tag()?;
    match tag {
        tags::EXPORT => {
            buf.read_u8()?;
            let module = decode_atom_name(buf)?;
            let function = decode_atom_name(buf)?;
            let arity = decode_small_uint(buf)?;
            Ok(Term::Fun(Fun::Export {
                module,
                function,
                arity: arity as u8,
            }))
        }
        tags::NEW_FUN => {
            buf.read_u8()?;
            let size = buf.read_u32()? as usize;
            let start = buf.read_pos() - 5;
            let arity = buf.read_u8()?;
            let mut uniq = [0u8; 16];
            uniq.copy_from_slice(buf.read_bytes(16)?);
            let index = buf.read_u32()?;
            let num_free = buf.read_u32()?;
            let module = decode_atom_name(buf)?;
            let old_index = decode_small_uint(buf)?;
            let old_uniq = decode_small_uint(buf)?;
            let pid = match decode(buf)? {
                Term::Pid(p) => p,
                _ => return Err(DecodingError::BadTerm("NEW_FUN pid field")),
            };
            let mut free_vars = Vec::with_capacity(num_free as usize);
            for _ in 0..num_free {
                free_vars.push(decode(buf)?);
            }
            let consumed = buf.read_pos() - start;
            if consumed != size {
                return Err(DecodingError::BadTerm("NEW_FUN size field mismatch"));
            }
            Ok(Term::Fun(Fun::Closure {
                module,
                arity,
                index,
                uniq,
                old_index,
                old_uniq,
                pid,
                free_vars,
            }))
        }
        tags::FUN => Err(DecodingError::BadTerm(
            "legacy FUN_EXT closures are not supported",
        )),
        other => Err(DecodingError::UnknownTag(other)),
    }
}

fn decode_atom_name(buf: &mut Buffer) -> Result<String, DecodingError> {
    match decode_atom(buf)? {
        Term::Atom(name) => Ok(name),
        _ => unreachable!(),
    }
}

fn decode_small_uint(buf: &mut Buffer) -> Result<u32, DecodingError> {
    match decode(buf)? {
        Term::Int(n) => Ok(n as u32),
        _ => Err(DecodingError::BadTerm("expected small integer term")),
    }
}
