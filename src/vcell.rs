
use core::cell::UnsafeCell;
use core::sync::atomic::{Ordering, compiler_fence};

/// Volatile cell for values shared between an interrupt handler and the main
/// loop.  Every cell has exactly one writer.
#[repr(transparent)]
pub struct VCell<T>(UnsafeCell<T>);

unsafe impl<T: Send> Sync for VCell<T> {}

impl<T: Copy> VCell<T> {
    #[inline(always)]
    pub const fn new(v: T) -> Self {Self(UnsafeCell::new(v))}

    #[inline(always)]
    pub fn read(&self) -> T {
        unsafe {core::ptr::read_volatile(self.as_ptr())}
    }

    #[inline(always)]
    pub fn write(&self, v: T) {
        unsafe {
            core::ptr::write_volatile(self.as_ptr(), v);
        }
    }

    #[inline(always)]
    pub fn as_ptr(&self) -> *mut T {
        self.0.get()
    }
}

impl<T: Copy> From<T> for VCell<T> {
    fn from(v: T) -> VCell<T> {VCell::new(v)}
}

/// Plain shared cell.  Access is serialised by the owner's protocol, not by
/// the type.
#[repr(transparent)]
pub struct UCell<T>(UnsafeCell<T>);

unsafe impl<T: Send> Sync for UCell<T> {}

impl<T> UCell<T> {
    pub const fn new(v: T) -> Self {Self(UnsafeCell::new(v))}

    /// # Safety
    /// The caller must be the only side touching the contents right now.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut(&self) -> &mut T {
        unsafe {&mut *self.0.get()}
    }

    /// # Safety
    /// No writer may be active while the reference is alive.
    pub unsafe fn as_ref(&self) -> &T {
        unsafe {&*self.0.get()}
    }
}

/// Stop the compiler moving memory accesses across this point.
#[inline(always)]
pub fn barrier() {
    compiler_fence(Ordering::SeqCst);
}

#[test]
fn vcell_round_trip() {
    let c = VCell::new(5i32);
    c.write(-7);
    assert_eq!(c.read(), -7);
    let c: VCell<bool> = true.into();
    assert!(c.read());
}
