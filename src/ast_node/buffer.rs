/*!

The node buffer: two arenas split by whether a node's type tag carries a
managed literal, the scope-table chain, the lazily created extra-root set, and
the token-stream handle. One host allocation holds the buffer struct and both
arenas' tail buckets; teardown returns all of it in a single synchronous pass.

*/

use std::alloc::Layout;
use std::ptr;

use tracing::{debug, trace};

use crate::{
  ast_node::{
    allocator::{Arena, Bucket, BUCKET_ALIGN},
    node::{node_init, LiteralNode},
    scope_table::{ScopeTable, ScopeTableLink},
    NodePtr, NodeType, Void, NODE_BUF_DEFAULT_SIZE,
  },
  host::{Host, HostRef, HostValue},
};

const fn round_up(size: usize, align: usize) -> usize {
  (size + align - 1) & !(align - 1)
}

const fn max_usize(a: usize, b: usize) -> usize {
  if a > b {
    a
  } else {
    b
  }
}

/// Offset of the first embedded tail bucket inside the buffer allocation.
const TAIL_OFFSET: usize = round_up(size_of::<NodeBuffer>(), BUCKET_ALIGN);
/// Span reserved for one embedded tail bucket: header plus default storage.
const TAIL_SPAN: usize = round_up(size_of::<Bucket>() + NODE_BUF_DEFAULT_SIZE, BUCKET_ALIGN);

pub struct NodeBuffer {
  unmarkable: Arena,
  markable: Arena,
  scope_tables: *mut ScopeTableLink,
  mark_set: Option<HostValue>,
  tokens: Option<HostValue>,
  host: HostRef,
}

impl NodeBuffer {
  /// Total size of the buffer allocation, embedded tail buckets included.
  pub(crate) const ALLOC_SIZE: usize = TAIL_OFFSET + 2 * TAIL_SPAN;

  fn layout() -> Layout {
    Layout::from_size_align(
      Self::ALLOC_SIZE,
      max_usize(align_of::<NodeBuffer>(), BUCKET_ALIGN),
    )
    .unwrap()
  }

  pub(crate) fn new(host: HostRef) -> *mut NodeBuffer {
    unsafe {
      let base = host.alloc(Self::layout());
      let buffer = base as *mut NodeBuffer;
      let unmarkable_tail = base.add(TAIL_OFFSET) as *mut Bucket;
      let markable_tail = base.add(TAIL_OFFSET + TAIL_SPAN) as *mut Bucket;
      Bucket::init(unmarkable_tail, NODE_BUF_DEFAULT_SIZE, host.as_ref());
      Bucket::init(markable_tail, NODE_BUF_DEFAULT_SIZE, host.as_ref());

      ptr::write(
        buffer,
        NodeBuffer {
          unmarkable: Arena::with_tail(unmarkable_tail),
          markable: Arena::with_tail(markable_tail),
          scope_tables: ptr::null_mut(),
          mark_set: None,
          tokens: None,
          host,
        },
      );

      debug!(bytes = Self::ALLOC_SIZE, "node buffer created");
      buffer
    }
  }

  #[inline(always)]
  pub(crate) fn host(&self) -> &dyn Host {
    self.host.as_ref()
  }

  /// Classifies by tag, allocates out of the matching arena, and stamps the
  /// node header. The payload past the header is zeroed storage for the
  /// caller to fill.
  pub(crate) fn new_node(&mut self, node_type: NodeType, size: usize, alignment: usize) -> NodePtr {
    let arena = if node_type.markable() {
      &mut self.markable
    } else {
      &mut self.unmarkable
    };
    let node = arena.allocate(self.host.as_ref(), size, alignment);
    node_init(node, node_type);
    node
  }

  /// Keeps `value` alive across collections even when no node references it.
  /// The backing identity set is created on first use.
  pub(crate) fn add_extra_root(&mut self, value: HostValue) {
    let set = match self.mark_set {
      Some(set) => set,
      None => {
        let set = self.host.ident_set_new();
        self.mark_set = Some(set);
        set
      }
    };
    self.host.set_insert(set, value);
  }

  /// Nothing to do when no root was ever added.
  pub(crate) fn remove_extra_root(&mut self, value: HostValue) {
    if let Some(set) = self.mark_set {
      self.host.set_remove(set, value);
    }
  }

  pub(crate) fn set_tokens(&mut self, tokens: HostValue) {
    self.tokens = Some(tokens);
  }

  pub(crate) fn tokens(&self) -> Option<HostValue> {
    self.tokens
  }

  /// Marking pass: the extra-root set, the token stream, then the literal of
  /// every node in the markable arena. The unmarkable arena holds no managed
  /// references by construction and is never visited.
  pub(crate) fn mark(&self) {
    let host = self.host.as_ref();
    if let Some(set) = self.mark_set {
      host.gc_mark(set);
    }
    if let Some(tokens) = self.tokens {
      host.gc_mark(tokens);
    }

    let mut visited = 0usize;
    self.markable.for_each(&mut |node| {
      mark_node_literal(host, node);
      visited += 1;
    });
    trace!(visited, "marked literal nodes");
  }

  /// Compaction follow-up: refresh every markable node's literal with its
  /// post-move location.
  pub(crate) fn update_references(&mut self) {
    let host = self.host.as_ref();
    self.markable.for_each(&mut |node| {
      let literal = literal_view(host, node);
      unsafe {
        (*literal).literal = host.gc_location((*literal).literal);
      }
    });
  }

  /// Bytes owned by this buffer: its own allocation, which already embeds
  /// both tail buckets, plus every grown bucket.
  pub(crate) fn footprint(&self) -> usize {
    Self::ALLOC_SIZE + self.unmarkable.footprint() + self.markable.footprint()
  }

  pub(crate) fn push_scope_table(&mut self, len: usize) -> *mut ScopeTable {
    let link = ScopeTableLink::new(self.host.as_ref(), len);
    unsafe {
      (*link).next = self.scope_tables;
      self.scope_tables = link;
      trace!(len, "pushed scope table");
      &mut (*link).table
    }
  }

  /// Grows the chain head in place. Tables below the head are frozen and
  /// unreachable through this API.
  pub(crate) fn grow_current_scope_table(&mut self, new_len: usize) -> *mut ScopeTable {
    debug_assert!(!self.scope_tables.is_null());
    unsafe {
      let link = ScopeTableLink::grow(self.host.as_ref(), self.scope_tables, new_len);
      self.scope_tables = link;
      &mut (*link).table
    }
  }

  /// Verifies the partition invariant: every node sits in the arena its tag
  /// calls for.
  #[cfg(feature = "gc_debug")]
  pub fn check_partitions(&self) {
    self.markable.for_each(&mut |node| {
      let node_type = unsafe { (*node).node_type() };
      if !node_type.markable() {
        self.host.bug(&format!("unreachable node {}", node_type.name()));
      }
    });
    self.unmarkable.for_each(&mut |node| {
      let node_type = unsafe { (*node).node_type() };
      if node_type.markable() {
        self.host.bug(&format!("misplaced literal node {}", node_type.name()));
      }
    });
  }

  pub fn unmarkable_arena(&self) -> &Arena {
    &self.unmarkable
  }

  pub fn markable_arena(&self) -> &Arena {
    &self.markable
  }

  pub fn mark_set(&self) -> Option<HostValue> {
    self.mark_set
  }

  /// Tears the whole buffer down: every bucket of both arenas, the scope
  /// chain, and finally the buffer allocation itself. The binding reference
  /// is released last.
  pub(crate) unsafe fn free(buffer: *mut NodeBuffer) {
    let host = (*buffer).host.clone();

    (*buffer).unmarkable.free(host.as_ref());
    (*buffer).markable.free(host.as_ref());

    let mut link = (*buffer).scope_tables;
    while !link.is_null() {
      let next = (*link).next;
      host.free(link as *mut Void, ScopeTableLink::layout((*link).table.len()));
      link = next;
    }

    ptr::drop_in_place(&mut (*buffer).host);
    host.free(buffer as *mut Void, Self::layout());
    debug!("node buffer freed");
  }
}

/// Every node reached through the markable arena must carry a literal; any
/// other tag here means the classification was subverted somewhere.
fn literal_view(host: &dyn Host, node: NodePtr) -> *mut LiteralNode {
  let node_type = unsafe { (*node).node_type() };
  if !node_type.markable() {
    host.bug(&format!("unreachable node {}", node_type.name()));
  }
  node as *mut LiteralNode
}

fn mark_node_literal(host: &dyn Host, node: NodePtr) {
  let literal = literal_view(host, node);
  host.gc_mark_movable(unsafe { (*literal).literal });
}

#[cfg(test)]
mod tests {
  use crate::host::testing::TestHost;
  use super::*;

  #[test]
  fn classification_routes_by_tag() {
    let host = TestHost::new();
    let buffer = NodeBuffer::new(host.clone());

    unsafe {
      let buffer_mut = &mut *buffer;
      for node_type in NodeType::ALL {
        buffer_mut.new_node(*node_type, size_of::<LiteralNode>(), align_of::<LiteralNode>());
      }

      assert_eq!(buffer_mut.markable_arena().node_count(), 8);
      assert_eq!(
        buffer_mut.unmarkable_arena().node_count(),
        NodeType::ALL.len() - 8
      );

      #[cfg(feature = "gc_debug")]
      buffer_mut.check_partitions();

      NodeBuffer::free(buffer);
    }
    assert_eq!(host.live_allocations(), 0);
  }

  #[test]
  #[should_panic(expected = "unreachable node")]
  fn mark_refuses_foreign_nodes() {
    let host = TestHost::new();
    let buffer = NodeBuffer::new(host.clone());

    unsafe {
      let buffer_mut = &mut *buffer;
      let node = buffer_mut.new_node(NodeType::Str, size_of::<LiteralNode>(), align_of::<LiteralNode>());
      (*node).set_type_unchecked(NodeType::If);
      buffer_mut.mark();
    }
  }

  #[test]
  fn allocation_size_covers_both_tails() {
    assert!(NodeBuffer::ALLOC_SIZE >= size_of::<NodeBuffer>() + 2 * (size_of::<Bucket>() + NODE_BUF_DEFAULT_SIZE));
  }
}
