/*!

The host binding: a capability table through which every allocation and every
managed-value operation in this crate is routed. An embedding runtime
implements [`Host`] once; each [`Ast`](crate::Ast) handle holds a shared
reference to one binding instance, and the binding is released when the last
handle sharing it goes away. Nothing in the arena code reaches for a concrete
runtime's primitives directly.

[`system_host`] is a lazily constructed binding backed by the process
allocator, for standalone builds and tests.

*/

use std::{
  alloc::{alloc_zeroed, dealloc, handle_alloc_error, realloc, Layout},
  collections::HashSet,
  sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;

use crate::ast_node::Void;

/// An opaque handle to a value managed by the host's garbage collector. The
/// zero handle is the host's nil; GC primitives ignore it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct HostValue(pub usize);

impl HostValue {
  pub const NIL: HostValue = HostValue(0);

  #[inline(always)]
  pub fn is_nil(self) -> bool {
    self.0 == 0
  }
}

/// Shared reference to a host binding. The `Arc` count is the binding's
/// lifetime counter: one increment per AST handle, one decrement at disposal,
/// released exactly when it reaches zero.
pub type HostRef = Arc<dyn Host>;

pub trait Host: Send + Sync {
  /// Returns zeroed storage for `layout`. Never returns null; storage
  /// exhaustion does not come back as an error.
  fn alloc(&self, layout: Layout) -> *mut Void;

  /// Grows or shrinks `ptr` (allocated with `old_layout`) to `new_size`
  /// bytes. Contents are preserved up to the smaller of the two sizes; any
  /// new bytes are uninitialized.
  fn realloc(&self, ptr: *mut Void, old_layout: Layout, new_size: usize) -> *mut Void;

  fn free(&self, ptr: *mut Void, layout: Layout);

  /// Creates an identity-keyed set of managed values, owned by the host.
  fn ident_set_new(&self) -> HostValue;

  fn set_insert(&self, set: HostValue, value: HostValue);

  fn set_remove(&self, set: HostValue, value: HostValue);

  /// Pins `value` during a marking pass.
  fn gc_mark(&self, value: HostValue);

  /// Marks `value` live but eligible for relocation by a compacting pass.
  fn gc_mark_movable(&self, value: HostValue);

  /// Resolves the post-move location of `value` after a compacting pass.
  fn gc_location(&self, value: HostValue) -> HostValue;

  /// Reports an internal consistency violation. Does not return.
  fn bug(&self, msg: &str) -> !;
}

/// Binding backed by the process allocator. There is no collector behind it:
/// the mark primitives are no-ops, `gc_location` is the identity, and
/// identity sets live until process exit.
#[derive(Default)]
pub struct SystemHost;

impl Host for SystemHost {
  fn alloc(&self, layout: Layout) -> *mut Void {
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
      handle_alloc_error(layout);
    }
    ptr
  }

  fn realloc(&self, ptr: *mut Void, old_layout: Layout, new_size: usize) -> *mut Void {
    let ptr = unsafe { realloc(ptr, old_layout, new_size) };
    if ptr.is_null() {
      handle_alloc_error(Layout::from_size_align(new_size, old_layout.align()).unwrap());
    }
    ptr
  }

  fn free(&self, ptr: *mut Void, layout: Layout) {
    unsafe { dealloc(ptr, layout) };
  }

  fn ident_set_new(&self) -> HostValue {
    let set: Box<Mutex<HashSet<HostValue>>> = Box::default();
    HostValue(Box::into_raw(set) as usize)
  }

  fn set_insert(&self, set: HostValue, value: HostValue) {
    let set = unsafe { &*(set.0 as *const Mutex<HashSet<HostValue>>) };
    set.lock().unwrap().insert(value);
  }

  fn set_remove(&self, set: HostValue, value: HostValue) {
    let set = unsafe { &*(set.0 as *const Mutex<HashSet<HostValue>>) };
    set.lock().unwrap().remove(&value);
  }

  fn gc_mark(&self, _value: HostValue) {}

  fn gc_mark_movable(&self, _value: HostValue) {}

  fn gc_location(&self, value: HostValue) -> HostValue {
    value
  }

  fn bug(&self, msg: &str) -> ! {
    panic!("{}", msg);
  }
}

static SYSTEM_HOST: Lazy<HostRef> = Lazy::new(|| Arc::new(SystemHost));

/// The process-wide default binding, shared by every handle created with
/// [`Ast::new`](crate::Ast::new).
pub fn system_host() -> HostRef {
  Arc::clone(&SYSTEM_HOST)
}
