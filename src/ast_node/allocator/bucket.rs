/*!

A `Bucket` is one contiguous region of node storage plus the index of every
node allocated inside it. Capacity never changes once the bucket exists; only
`used` advances.

*/

use std::alloc::Layout;
use std::ptr;

use crate::{
  ast_node::{Node, NodePtr, Void},
  host::Host,
};

use super::BUCKET_ALIGN;

#[repr(C, align(16))]
pub struct Bucket {
  pub(crate) capacity: usize,
  pub(crate) used: usize,
  pub(crate) len: usize,
  pub(crate) nodes: *mut NodePtr,
  pub(crate) next: *mut Bucket,
}

impl Bucket {
  /// Layout of a standalone bucket: header plus `capacity` bytes of node
  /// storage in one block.
  pub(crate) fn layout(capacity: usize) -> Layout {
    Layout::from_size_align(size_of::<Bucket>() + capacity, BUCKET_ALIGN).unwrap()
  }

  /// Layout of the side index, sized for the worst case of nothing but
  /// header-sized nodes.
  pub(crate) fn index_layout(capacity: usize) -> Layout {
    Layout::array::<NodePtr>(capacity / size_of::<Node>()).unwrap()
  }

  /// Writes a bucket header at `bucket` and allocates its index array. The
  /// storage bytes after the header belong to whoever allocated the block
  /// and arrive zeroed.
  pub(crate) unsafe fn init(bucket: *mut Bucket, capacity: usize, host: &dyn Host) {
    let nodes = host.alloc(Self::index_layout(capacity)) as *mut NodePtr;
    ptr::write(
      bucket,
      Bucket {
        capacity,
        used: 0,
        len: 0,
        nodes,
        next: ptr::null_mut(),
      },
    );
  }

  /// First byte of node storage. The header size is padded to `BUCKET_ALIGN`,
  /// so this lands on an aligned boundary whenever the block itself does.
  #[inline(always)]
  pub(crate) fn storage(bucket: *mut Bucket) -> *mut Void {
    unsafe { bucket.add(1) as *mut Void }
  }

  #[inline(always)]
  pub(crate) fn record(&mut self, node: NodePtr) {
    unsafe {
      *self.nodes.add(self.len) = node;
    }
    self.len += 1;
  }
}
