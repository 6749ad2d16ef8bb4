use std::fmt;

/// Width of a pointer, in bytes, for every supported target.
pub const POINTER_WIDTH: u64 = 8;

/// First-class types of the intermediate representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    Int(u32),
    /// Opaque pointer.
    Ptr,
    /// Anonymous, non-packed aggregate.
    Struct(Vec<Type>),
    Array(u64, Box<Type>),
}

/// A function signature, as used by declarations and call sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<Type>,
    pub variadic: bool,
}

impl Type {
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    pub fn is_void(&self) -> bool {
        *self == Type::Void
    }

    /// Allocation size in bytes, following the usual 64-bit data layout
    /// (natural alignment, padded aggregates).
    pub fn size_of(&self) -> u64 {
        match self {
            Type::Void => 0,
            Type::Int(bits) => int_bytes(*bits),
            Type::Ptr => POINTER_WIDTH,
            Type::Struct(fields) => {
                let mut offset = 0;
                for field in fields {
                    offset = align_to(offset, field.align_of()) + field.size_of();
                }
                align_to(offset, self.align_of())
            }
            Type::Array(len, element) => len * element.size_of(),
        }
    }

    pub fn align_of(&self) -> u64 {
        match self {
            Type::Void => 1,
            Type::Int(bits) => int_bytes(*bits).min(8),
            Type::Ptr => POINTER_WIDTH,
            Type::Struct(fields) => fields.iter().map(Type::align_of).max().unwrap_or(1),
            Type::Array(_, element) => element.align_of(),
        }
    }

    /// Byte offset of the field at `index` inside a struct type.
    pub fn field_offset(&self, index: usize) -> Option<u64> {
        let Type::Struct(fields) = self else {
            return None;
        };
        let mut offset = 0;
        for (i, field) in fields.iter().enumerate() {
            offset = align_to(offset, field.align_of());
            if i == index {
                return Some(offset);
            }
            offset += field.size_of();
        }
        None
    }
}

fn int_bytes(bits: u32) -> u64 {
    u64::from(bits.div_ceil(8).max(1)).next_power_of_two()
}

fn align_to(offset: u64, align: u64) -> u64 {
    offset.div_ceil(align) * align
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr => f.write_str("ptr"),
            Type::Struct(fields) if fields.is_empty() => f.write_str("{}"),
            Type::Struct(fields) => {
                f.write_str("{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(" }")
            }
            Type::Array(len, element) => write!(f, "[{len} x {element}]"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}
