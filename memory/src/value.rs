use std::fmt;

// --- NaN-boxed u64 layout ---
// Any bit pattern outside the quiet-NaN space is a plain IEEE 754 double.
// Boxed values live in the quiet-NaN space:
//   [QNAN bits 62-51][tag bits 50-44 (7 bits)][payload bits 43-0 (44 bits)]
// Payload holds either an inline i44 integer or a u32 heap handle.

const QNAN: u64 = 0x7FF8_0000_0000_0000;
const TAG_SHIFT: u32 = 44;
const TAG_MASK: u64 = 0x7F << TAG_SHIFT;
const PAYLOAD_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

// Tag 0 is reserved for the canonical script-level NaN.
pub const TAG_NAN: u64 = 0;
pub const TAG_NIL: u64 = 1;
pub const TAG_TRUE: u64 = 2;
pub const TAG_FALSE: u64 = 3;
pub const TAG_INT: u64 = 4; // i44 inline
pub const TAG_STRING: u64 = 8;
pub const TAG_FUNCTION: u64 = 9;
pub const TAG_CLOSURE: u64 = 10;
pub const TAG_CLASS: u64 = 11;
pub const TAG_INSTANCE: u64 = 12;

/// First tag that denotes a heap handle.
pub const TAG_FIRST_OBJ: u64 = TAG_STRING;

// i44 range for inline integers
pub const I44_MIN: i64 = -(1i64 << 43);
pub const I44_MAX: i64 = (1i64 << 43) - 1;

// Compile-time guards
const _: () = assert!(TAG_INSTANCE < 128, "tag must fit in 7 bits");
const _: () = assert!(TAG_FIRST_OBJ > TAG_INT, "object tags must follow inline tags");

/// Script float width. A build-time choice fixed for the whole process:
/// storage is always the 64-bit NaN box, but every read and write narrows
/// to `Float`, so all natives compute at the same width.
#[cfg(feature = "float32")]
pub type Float = f32;
#[cfg(not(feature = "float32"))]
pub type Float = f64;

#[derive(Clone, Copy, PartialEq)]
#[repr(transparent)]
pub struct Value(pub u64);

impl Value {
    // --- Constructors ---

    #[inline]
    pub fn nil() -> Self {
        Self::boxed(TAG_NIL, 0)
    }

    #[inline]
    pub fn bool(b: bool) -> Self {
        if b {
            Self::boxed(TAG_TRUE, 0)
        } else {
            Self::boxed(TAG_FALSE, 0)
        }
    }

    #[inline]
    pub fn int(n: i64) -> Self {
        debug_assert!((I44_MIN..=I44_MAX).contains(&n), "int out of i44 range: {}", n);
        Self::boxed(TAG_INT, (n as u64) & PAYLOAD_MASK)
    }

    #[inline]
    pub fn float(f: Float) -> Self {
        let wide = f as f64;
        if wide.is_nan() {
            // Canonical NaN, so script NaNs never collide with boxed tags.
            Self(QNAN)
        } else {
            Self(wide.to_bits())
        }
    }

    #[inline]
    pub fn string(handle: u32) -> Self {
        Self::boxed(TAG_STRING, handle as u64)
    }

    #[inline]
    pub fn function(handle: u32) -> Self {
        Self::boxed(TAG_FUNCTION, handle as u64)
    }

    #[inline]
    pub fn closure(handle: u32) -> Self {
        Self::boxed(TAG_CLOSURE, handle as u64)
    }

    #[inline]
    pub fn class(handle: u32) -> Self {
        Self::boxed(TAG_CLASS, handle as u64)
    }

    #[inline]
    pub fn instance(handle: u32) -> Self {
        Self::boxed(TAG_INSTANCE, handle as u64)
    }

    #[inline]
    fn boxed(tag: u64, payload: u64) -> Self {
        Self(QNAN | (tag << TAG_SHIFT) | (payload & PAYLOAD_MASK))
    }

    // --- Type checks ---

    #[inline]
    fn is_boxed(&self) -> bool {
        (self.0 & QNAN) == QNAN
    }

    /// Tag of a boxed value; `TAG_NAN` for the canonical NaN.
    #[inline]
    pub fn type_tag(&self) -> u64 {
        debug_assert!(self.is_boxed());
        (self.0 & TAG_MASK) >> TAG_SHIFT
    }

    #[inline]
    pub fn is_float(&self) -> bool {
        !self.is_boxed() || self.0 == QNAN
    }

    #[inline]
    pub fn is_int(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_INT
    }

    /// Int or float.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_NIL
    }

    #[inline]
    pub fn is_bool(&self) -> bool {
        self.is_boxed() && matches!(self.type_tag(), TAG_TRUE | TAG_FALSE)
    }

    #[inline]
    pub fn is_obj(&self) -> bool {
        self.is_boxed() && self.type_tag() >= TAG_FIRST_OBJ
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_STRING
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_FUNCTION
    }

    #[inline]
    pub fn is_closure(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_CLOSURE
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_CLASS
    }

    #[inline]
    pub fn is_instance(&self) -> bool {
        self.is_boxed() && self.type_tag() == TAG_INSTANCE
    }

    /// Only `nil` and `false` are falsey.
    #[inline]
    pub fn is_falsey(&self) -> bool {
        self.is_nil() || self.0 == (QNAN | (TAG_FALSE << TAG_SHIFT))
    }

    // --- Accessors ---

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        if !self.is_int() {
            return None;
        }
        let payload = self.0 & PAYLOAD_MASK;
        // Sign-extend from bit 43
        if payload & (1 << 43) != 0 {
            Some((payload | !PAYLOAD_MASK) as i64)
        } else {
            Some(payload as i64)
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<Float> {
        if self.is_float() {
            Some(f64::from_bits(self.0) as Float)
        } else {
            None
        }
    }

    /// Numeric widening used by arithmetic: ints convert, floats pass
    /// through, everything else is `None`.
    #[inline]
    pub fn as_numeric(&self) -> Option<Float> {
        if let Some(i) = self.as_int() {
            Some(i as Float)
        } else {
            self.as_float()
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        if !self.is_boxed() {
            return None;
        }
        match self.type_tag() {
            TAG_TRUE => Some(true),
            TAG_FALSE => Some(false),
            _ => None,
        }
    }

    /// Heap handle of an object value.
    #[inline]
    pub fn as_handle(&self) -> Option<u32> {
        if self.is_obj() {
            Some((self.0 & PAYLOAD_MASK) as u32)
        } else {
            None
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_float() {
            return write!(f, "Float({})", f64::from_bits(self.0));
        }
        let handle = (self.0 & PAYLOAD_MASK) as u32;
        match self.type_tag() {
            TAG_NIL => write!(f, "Nil"),
            TAG_TRUE => write!(f, "True"),
            TAG_FALSE => write!(f, "False"),
            TAG_INT => write!(f, "Int({})", self.as_int().unwrap_or(0)),
            TAG_STRING => write!(f, "String(#{})", handle),
            TAG_FUNCTION => write!(f, "Function(#{})", handle),
            TAG_CLOSURE => write!(f, "Closure(#{})", handle),
            TAG_CLASS => write!(f, "Class(#{})", handle),
            TAG_INSTANCE => write!(f, "Instance(#{})", handle),
            _ => write!(f, "Value({:016x})", self.0),
        }
    }
}
