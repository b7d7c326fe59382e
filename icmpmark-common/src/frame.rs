use core::mem;

/// A captured frame addressed by its first and one-past-last byte.
///
/// # Safety
///
/// Implementors guarantee that every address in `[data(), data_end())` is
/// readable for as long as the value is borrowed.
pub unsafe trait Frame {
    fn data(&self) -> usize;

    fn data_end(&self) -> usize;

    #[inline(always)]
    fn len(&self) -> usize {
        self.data_end().saturating_sub(self.data())
    }

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies a `T` out of the frame at `offset`, or `None` when it does not fit.
    #[inline(always)]
    fn load<T: Copy>(&self, offset: usize) -> Option<T> {
        let ptr = ptr_at::<T>(self.data(), self.data_end(), offset)?;
        Some(unsafe { ptr.read_unaligned() })
    }
}

unsafe impl Frame for [u8] {
    #[inline(always)]
    fn data(&self) -> usize {
        self.as_ptr() as usize
    }

    #[inline(always)]
    fn data_end(&self) -> usize {
        self.as_ptr() as usize + self.len()
    }
}

/// Bounds guard: returns a pointer to `offset` only if a whole `T` fits before `end`.
///
/// The verifier has to see `ptr + len > end` literally, so the sum goes through
/// `black_box` to stop it being folded into `ptr > end - len`.
#[inline(always)]
pub fn ptr_at<T>(start: usize, end: usize, offset: usize) -> Option<*const T> {
    let ptr = start + offset;
    let access_end = core::hint::black_box(ptr + mem::size_of::<T>());

    if access_end > end {
        return None;
    }

    Some(ptr as *const T)
}

/// A forward-only position inside a [`Frame`].
pub struct Cursor<'a, F: ?Sized> {
    frame: &'a F,
    offset: usize,
}

impl<'a, F> Cursor<'a, F>
where
    F: Frame + ?Sized,
{
    #[inline(always)]
    pub fn new(frame: &'a F) -> Self {
        Self { frame, offset: 0 }
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Projects a `T` at the cursor without moving it.
    #[inline(always)]
    pub fn view<T: Copy>(&self) -> Option<T> {
        self.frame.load(self.offset)
    }

    /// Moves forward `len` bytes. The cursor never passes the frame end.
    #[inline(always)]
    pub fn advance(&mut self, len: usize) -> Option<()> {
        let next = self.offset + len;
        if next > self.frame.len() {
            return None;
        }

        self.offset = next;
        Some(())
    }

    /// Skips a variable-length header of type `T` whose on-wire length is `len`.
    ///
    /// A length shorter than `T` itself would move the cursor back inside the
    /// header it just read, so it is refused like any other out-of-bounds move.
    #[inline(always)]
    pub fn advance_over<T>(&mut self, len: usize) -> Option<()> {
        if len < mem::size_of::<T>() {
            return None;
        }

        self.advance(len)
    }
}
