//! Reader and writer for the `.orbc` binary executable format.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "ORB\x01"
//! u32 string count, then per string: u32 byte length + UTF-8 bytes
//! u32 prototype count, then per prototype:
//!     u32 name (string-table index, NO_NAME when absent)
//!     u8 arity, u16 max_slots
//!     u32 constant count, then per constant: u8 tag + payload
//!     u32 code length, then u32 instruction words
//! u32 main prototype index
//! ```

use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use memory::{Float, Function, FunctionKind, Value};

use crate::opcode::instruction;
use crate::specs;
use crate::unit::CompiledUnit;

#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    /// Structurally invalid file: bad magic, out-of-range index, length
    /// field past a limit, unknown tag or opcode.
    Malformed(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(err) => write!(f, "{}", err),
            LoadError::Malformed(msg) => write!(f, "malformed executable: {}", msg),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::Io(err)
    }
}

fn malformed(msg: impl Into<String>) -> LoadError {
    LoadError::Malformed(msg.into())
}

/// Serialize a compiled unit. Warnings are a compile-time artifact and are
/// not part of the format.
pub fn save_executable<W: Write>(unit: &CompiledUnit, writer: &mut W) -> io::Result<()> {
    writer.write_all(&specs::MAGIC)?;

    writer.write_u32::<LittleEndian>(unit.strings.len() as u32)?;
    for string in &unit.strings {
        writer.write_u32::<LittleEndian>(string.len() as u32)?;
        writer.write_all(string.as_bytes())?;
    }

    writer.write_u32::<LittleEndian>(unit.protos.len() as u32)?;
    for proto in &unit.protos {
        let (arity, max_slots, chunk, constants) = match &proto.kind {
            FunctionKind::Bytecode {
                arity,
                max_slots,
                chunk,
                constants,
            } => (*arity, *max_slots, chunk, constants),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "only bytecode prototypes are serializable",
                ));
            }
        };

        let name_index = match &proto.name {
            Some(name) => unit
                .strings
                .iter()
                .position(|s| s == name)
                .map(|i| i as u32)
                .unwrap_or(specs::NO_NAME),
            None => specs::NO_NAME,
        };
        writer.write_u32::<LittleEndian>(name_index)?;
        writer.write_u8(arity)?;
        writer.write_u16::<LittleEndian>(max_slots)?;

        writer.write_u32::<LittleEndian>(constants.len() as u32)?;
        for constant in constants {
            write_constant(*constant, writer)?;
        }

        writer.write_u32::<LittleEndian>(chunk.len() as u32)?;
        for word in chunk {
            writer.write_u32::<LittleEndian>(*word)?;
        }
    }

    writer.write_u32::<LittleEndian>(unit.main)?;
    Ok(())
}

fn write_constant<W: Write>(value: Value, writer: &mut W) -> io::Result<()> {
    if value.is_nil() {
        return writer.write_u8(specs::TAG_NULL);
    }
    if let Some(b) = value.as_bool() {
        return writer.write_u8(if b { specs::TAG_TRUE } else { specs::TAG_FALSE });
    }
    if let Some(i) = value.as_int() {
        writer.write_u8(specs::TAG_INT)?;
        return writer.write_i64::<LittleEndian>(i);
    }
    if let Some(f) = value.as_float() {
        writer.write_u8(specs::TAG_FLOAT)?;
        return writer.write_f64::<LittleEndian>(f as f64);
    }
    if let Some(handle) = value.as_handle() {
        if value.is_string() {
            writer.write_u8(specs::TAG_STRING)?;
            return writer.write_u32::<LittleEndian>(handle);
        }
        if value.is_function() {
            writer.write_u8(specs::TAG_FUNCTION)?;
            return writer.write_u32::<LittleEndian>(handle);
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "constant pool holds a non-serializable value",
    ))
}

/// Read and validate an executable. Every length field is checked against
/// the limits in [`specs`] before allocating, and every index against the
/// table it points into.
pub fn load_executable<R: Read>(reader: &mut R) -> Result<CompiledUnit, LoadError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != specs::MAGIC {
        return Err(malformed("bad magic"));
    }

    let string_count = reader.read_u32::<LittleEndian>()?;
    if string_count > specs::MAX_STRINGS {
        return Err(malformed("string table too large"));
    }
    let mut strings = Vec::with_capacity(string_count as usize);
    for _ in 0..string_count {
        let len = reader.read_u32::<LittleEndian>()?;
        if len > specs::MAX_STRING_LEN {
            return Err(malformed("string constant too long"));
        }
        let mut bytes = vec![0u8; len as usize];
        reader.read_exact(&mut bytes)?;
        let string = String::from_utf8(bytes).map_err(|_| malformed("invalid UTF-8 string"))?;
        strings.push(string);
    }

    let proto_count = reader.read_u32::<LittleEndian>()?;
    if proto_count == 0 || proto_count > specs::MAX_PROTOS {
        return Err(malformed("bad prototype count"));
    }
    let mut protos = Vec::with_capacity(proto_count as usize);
    for _ in 0..proto_count {
        protos.push(read_proto(reader, string_count, proto_count, &strings)?);
    }

    let main = reader.read_u32::<LittleEndian>()?;
    if main >= proto_count {
        return Err(malformed("main index out of range"));
    }

    Ok(CompiledUnit {
        strings,
        protos,
        main,
        warnings: Vec::new(),
    })
}

fn read_proto<R: Read>(
    reader: &mut R,
    string_count: u32,
    proto_count: u32,
    strings: &[String],
) -> Result<Function, LoadError> {
    let name_index = reader.read_u32::<LittleEndian>()?;
    let name = if name_index == specs::NO_NAME {
        None
    } else if name_index < string_count {
        Some(strings[name_index as usize].clone())
    } else {
        return Err(malformed("prototype name index out of range"));
    };

    let arity = reader.read_u8()?;
    let max_slots = reader.read_u16::<LittleEndian>()?;

    let constant_count = reader.read_u32::<LittleEndian>()?;
    if constant_count > specs::MAX_CONSTANTS {
        return Err(malformed("constant pool too large"));
    }
    let mut constants = Vec::with_capacity(constant_count as usize);
    for _ in 0..constant_count {
        constants.push(read_constant(reader, string_count, proto_count)?);
    }

    let code_len = reader.read_u32::<LittleEndian>()?;
    if code_len > specs::MAX_CODE_LEN {
        return Err(malformed("code section too large"));
    }
    let mut chunk = Vec::with_capacity(code_len as usize);
    for _ in 0..code_len {
        let word = reader.read_u32::<LittleEndian>()?;
        if instruction::op(word).is_none() {
            return Err(malformed("unknown opcode"));
        }
        chunk.push(word);
    }

    Ok(Function {
        name,
        kind: FunctionKind::Bytecode {
            arity,
            max_slots,
            chunk,
            constants,
        },
    })
}

fn read_constant<R: Read>(
    reader: &mut R,
    string_count: u32,
    proto_count: u32,
) -> Result<Value, LoadError> {
    let tag = reader.read_u8()?;
    let value = match tag {
        specs::TAG_NULL => Value::nil(),
        specs::TAG_TRUE => Value::bool(true),
        specs::TAG_FALSE => Value::bool(false),
        specs::TAG_INT => {
            let n = reader.read_i64::<LittleEndian>()?;
            if !(memory::value::I44_MIN..=memory::value::I44_MAX).contains(&n) {
                return Err(malformed("int constant out of range"));
            }
            Value::int(n)
        }
        specs::TAG_FLOAT => Value::float(reader.read_f64::<LittleEndian>()? as Float),
        specs::TAG_STRING => {
            let index = reader.read_u32::<LittleEndian>()?;
            if index >= string_count {
                return Err(malformed("string constant index out of range"));
            }
            Value::string(index)
        }
        specs::TAG_FUNCTION => {
            let index = reader.read_u32::<LittleEndian>()?;
            if index >= proto_count {
                return Err(malformed("function constant index out of range"));
            }
            Value::function(index)
        }
        _ => return Err(malformed("unknown constant tag")),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{instruction::encode_abx, Opcode};

    fn sample_unit() -> CompiledUnit {
        CompiledUnit {
            strings: vec!["greeting".to_string(), "main".to_string()],
            protos: vec![Function {
                name: Some("main".to_string()),
                kind: FunctionKind::Bytecode {
                    arity: 0,
                    max_slots: 2,
                    chunk: vec![
                        encode_abx(Opcode::LoadConst, 0, 0),
                        instruction::encode_abc(Opcode::Return, 0, 1, 0),
                    ],
                    constants: vec![Value::string(0), Value::int(7), Value::float(1.5)],
                },
            }],
            main: 0,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn save_then_load_preserves_the_unit() {
        let unit = sample_unit();
        let mut bytes = Vec::new();
        save_executable(&unit, &mut bytes).unwrap();

        let loaded = load_executable(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.strings, unit.strings);
        assert_eq!(loaded.main, 0);
        assert_eq!(loaded.protos.len(), 1);
        assert_eq!(loaded.protos[0].name.as_deref(), Some("main"));
        match (&loaded.protos[0].kind, &unit.protos[0].kind) {
            (
                FunctionKind::Bytecode {
                    chunk, constants, ..
                },
                FunctionKind::Bytecode {
                    chunk: want_chunk,
                    constants: want_constants,
                    ..
                },
            ) => {
                assert_eq!(chunk, want_chunk);
                assert_eq!(constants, want_constants);
            }
            _ => panic!("expected bytecode prototypes"),
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = Vec::new();
        save_executable(&sample_unit(), &mut bytes).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            load_executable(&mut bytes.as_slice()),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_oversized_string_table() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&specs::MAGIC);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            load_executable(&mut bytes.as_slice()),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_main() {
        let mut unit = sample_unit();
        unit.main = 9;
        let mut bytes = Vec::new();
        save_executable(&unit, &mut bytes).unwrap();
        assert!(matches!(
            load_executable(&mut bytes.as_slice()),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let mut bytes = Vec::new();
        save_executable(&sample_unit(), &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            load_executable(&mut bytes.as_slice()),
            Err(LoadError::Io(_))
        ));
    }
}
