/// One activation record on the fiber.
///
/// `base` indexes the frame's register 0 in the machine stack; the
/// receiver of the call sits at `base - 1`. `dest_reg` is the caller
/// register the return value lands in; it is `None` for constructor and
/// setter frames, whose return value is discarded.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame {
    pub closure: u32,
    pub ip: usize,
    pub base: usize,
    pub dest_reg: Option<u8>,
}

impl CallFrame {
    pub fn new(closure: u32, base: usize, dest_reg: Option<u8>) -> Self {
        CallFrame {
            closure,
            ip: 0,
            base,
            dest_reg,
        }
    }
}
