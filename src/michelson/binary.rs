//! Binary Micheline encoding.
//!
//! ```text
//! 0x00 int         zarith
//! 0x01 string      u32 length + bytes
//! 0x02 sequence    u32 length + nodes
//! 0x03..0x08 prim  code, args (0/1/2), optional u32-prefixed annots
//! 0x09 prim        code, u32-prefixed args, u32-prefixed annots
//! 0x0a bytes       u32 length + bytes
//! ```

use num_bigint::{BigInt, BigUint, Sign};

use crate::michelson::error::EncodingError;
use crate::michelson::micheline::Micheline;
use crate::michelson::primitives;

/// Append the binary form of `node` to `out`.
pub fn encode(node: &Micheline, out: &mut Vec<u8>) -> Result<(), EncodingError> {
    match node {
        Micheline::Int { int } => {
            out.push(0x00);
            write_zarith(int, out);
        }
        Micheline::String { string } => {
            out.push(0x01);
            write_prefixed(string.as_bytes(), out);
        }
        Micheline::Seq(items) => {
            out.push(0x02);
            let mut body = Vec::new();
            for item in items {
                encode(item, &mut body)?;
            }
            write_prefixed(&body, out);
        }
        Micheline::Prim { prim, args, annots } => {
            let code = primitives::code_of(prim)
                .ok_or_else(|| EncodingError::UnknownPrimitive(prim.clone()))?;
            let annotated = !annots.is_empty();
            match args.len() {
                0..=2 => {
                    out.push(0x03 + 2 * args.len() as u8 + u8::from(annotated));
                    out.push(code);
                    for arg in args {
                        encode(arg, out)?;
                    }
                    if annotated {
                        write_prefixed(annots.join(" ").as_bytes(), out);
                    }
                }
                _ => {
                    out.push(0x09);
                    out.push(code);
                    let mut body = Vec::new();
                    for arg in args {
                        encode(arg, &mut body)?;
                    }
                    write_prefixed(&body, out);
                    write_prefixed(annots.join(" ").as_bytes(), out);
                }
            }
        }
        Micheline::Bytes { bytes } => {
            out.push(0x0a);
            write_prefixed(bytes, out);
        }
    }
    Ok(())
}

/// Encode `node` into a fresh buffer.
pub fn to_bytes(node: &Micheline) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    encode(node, &mut out)?;
    Ok(out)
}

/// Decode exactly one node spanning all of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Micheline, EncodingError> {
    let mut reader = Reader { bytes, pos: 0, depth: 0 };
    let node = reader.node()?;
    if reader.pos != bytes.len() {
        return Err(reader.error("trailing bytes after expression"));
    }
    Ok(node)
}

fn write_prefixed(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Signed zarith: 6 payload bits and a sign bit in the first byte, 7 bits
/// per following byte, high bit set on every byte but the last.
pub fn write_zarith(value: &BigInt, out: &mut Vec<u8>) {
    let mut magnitude = value.magnitude().clone();
    let low = magnitude.iter_u64_digits().next().unwrap_or(0);
    let mut byte = (low & 0x3f) as u8;
    if value.sign() == Sign::Minus {
        byte |= 0x40;
    }
    magnitude >>= 6u32;
    loop {
        let more = magnitude != BigUint::default();
        if more {
            byte |= 0x80;
        }
        out.push(byte);
        if !more {
            break;
        }
        let low = magnitude.iter_u64_digits().next().unwrap_or(0);
        byte = (low & 0x7f) as u8;
        magnitude >>= 7u32;
    }
}

/// Deepest nesting accepted when decoding.
pub const MAX_DEPTH: usize = 1_000;

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, reason: impl Into<String>) -> EncodingError {
        EncodingError::Decode { offset: self.pos, reason: reason.into() }
    }

    fn u8(&mut self) -> Result<u8, EncodingError> {
        let byte = *self.bytes.get(self.pos).ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn slice(&mut self, len: usize) -> Result<&'a [u8], EncodingError> {
        if self.bytes.len() - self.pos < len {
            return Err(self.error(format!("expected {len} more bytes")));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn prefixed(&mut self) -> Result<&'a [u8], EncodingError> {
        let len = self.slice(4)?;
        let len = u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize;
        self.slice(len)
    }

    fn string(&mut self) -> Result<String, EncodingError> {
        let raw = self.prefixed()?;
        String::from_utf8(raw.to_vec()).map_err(|_| self.error("string is not utf-8"))
    }

    fn zarith(&mut self) -> Result<BigInt, EncodingError> {
        let first = self.u8()?;
        let negative = first & 0x40 != 0;
        let mut magnitude = BigUint::from(first & 0x3f);
        let mut shift = 6u32;
        let mut byte = first;
        while byte & 0x80 != 0 {
            byte = self.u8()?;
            if byte == 0 {
                return Err(self.error("non-canonical zarith encoding"));
            }
            magnitude |= BigUint::from(byte & 0x7f) << shift;
            shift += 7;
        }
        if negative && magnitude == BigUint::default() {
            return Err(self.error("negative zero"));
        }
        let sign = if negative { Sign::Minus } else { Sign::Plus };
        Ok(BigInt::from_biguint(sign, magnitude))
    }

    fn prim_name(&mut self) -> Result<String, EncodingError> {
        let code = self.u8()?;
        primitives::name_of(code)
            .map(str::to_string)
            .ok_or_else(|| self.error(format!("unknown primitive code {code}")))
    }

    fn annots(&mut self) -> Result<Vec<String>, EncodingError> {
        let text = self.string()?;
        Ok(text.split(' ').filter(|a| !a.is_empty()).map(str::to_string).collect())
    }

    fn nodes_until(&mut self, end: usize) -> Result<Vec<Micheline>, EncodingError> {
        let mut items = Vec::new();
        while self.pos < end {
            items.push(self.node()?);
        }
        if self.pos != end {
            return Err(self.error("node overruns its enclosing length"));
        }
        Ok(items)
    }

    fn node(&mut self) -> Result<Micheline, EncodingError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("expression nested deeper than {MAX_DEPTH}")));
        }
        self.depth += 1;
        let node = self.node_body();
        self.depth -= 1;
        node
    }

    fn node_body(&mut self) -> Result<Micheline, EncodingError> {
        let tag = self.u8()?;
        match tag {
            0x00 => Ok(Micheline::Int { int: self.zarith()? }),
            0x01 => Ok(Micheline::String { string: self.string()? }),
            0x02 => {
                let body = self.prefixed()?;
                let end = self.pos;
                self.pos -= body.len();
                Ok(Micheline::Seq(self.nodes_until(end)?))
            }
            0x03..=0x08 => {
                let arity = ((tag - 0x03) / 2) as usize;
                let annotated = (tag - 0x03) % 2 == 1;
                let prim = self.prim_name()?;
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.node()?);
                }
                let annots = if annotated { self.annots()? } else { Vec::new() };
                Ok(Micheline::Prim { prim, args, annots })
            }
            0x09 => {
                let prim = self.prim_name()?;
                let body = self.prefixed()?;
                let end = self.pos;
                self.pos -= body.len();
                let args = self.nodes_until(end)?;
                let annots = self.annots()?;
                Ok(Micheline::Prim { prim, args, annots })
            }
            0x0a => Ok(Micheline::Bytes { bytes: self.prefixed()?.to_vec() }),
            other => Err(EncodingError::Decode {
                offset: self.pos - 1,
                reason: format!("unknown node tag 0x{other:02x}"),
            }),
        }
    }
}
