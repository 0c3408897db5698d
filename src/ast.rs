/*!

The externally visible AST handle: creation against a host binding, node
allocation, the GC callback surface, size accounting, and one-shot disposal.

*/

use std::ptr::null_mut;

use crate::{
  ast_node::{buffer::NodeBuffer, scope_table::ScopeTable, NodePtr, NodeType},
  host::{system_host, HostRef, HostValue},
};

/// One parsed tree. A handle lives on one thread; the host serializes its GC
/// callbacks against parser activity.
pub struct Ast {
  node_buffer: *mut NodeBuffer,
  root: NodePtr,
  script_lines: Option<HostValue>,
}

impl Ast {
  /// Creates a tree against the process-wide system binding.
  pub fn new() -> Ast {
    Ast::with_host(system_host())
  }

  /// Creates a tree against an explicit host binding. The binding is shared:
  /// it stays alive at least until the last handle created against it is
  /// disposed.
  pub fn with_host(host: HostRef) -> Ast {
    Ast {
      node_buffer: NodeBuffer::new(host),
      root: null_mut(),
      script_lines: None,
    }
  }

  /// Allocates and stamps a node of `node_type`. `size` covers the header
  /// plus payload; `alignment` is the payload's strictest member. The node
  /// stays valid until this handle is disposed.
  pub fn new_node(&mut self, node_type: NodeType, size: usize, alignment: usize) -> NodePtr {
    debug_assert!(!self.node_buffer.is_null(), "allocation on a disposed tree");
    unsafe { (*self.node_buffer).new_node(node_type, size, alignment) }
  }

  /// Typed convenience over [`Ast::new_node`] for payload structs that begin
  /// with the node header.
  pub fn new_node_of<T>(&mut self, node_type: NodeType) -> *mut T {
    self.new_node(node_type, size_of::<T>(), align_of::<T>()) as *mut T
  }

  /// Individual nodes are never reclaimed; the whole tree goes at once when
  /// the handle is disposed.
  pub fn delete_node(&mut self, _node: NodePtr) {}

  pub fn root(&self) -> NodePtr {
    self.root
  }

  pub fn set_root(&mut self, root: NodePtr) {
    self.root = root;
  }

  pub fn script_lines(&self) -> Option<HostValue> {
    self.script_lines
  }

  /// Caches the original source lines as a managed value; it participates in
  /// marking from then on.
  pub fn set_script_lines(&mut self, lines: HostValue) {
    self.script_lines = Some(lines);
  }

  pub fn tokens(&self) -> Option<HostValue> {
    unsafe { (*self.node_buffer).tokens() }
  }

  pub fn set_tokens(&mut self, tokens: HostValue) {
    unsafe { (*self.node_buffer).set_tokens(tokens) }
  }

  /// Keeps `value` alive across collections even when no node references it.
  pub fn add_extra_root(&mut self, value: HostValue) {
    unsafe { (*self.node_buffer).add_extra_root(value) }
  }

  /// Drops `value` from the extra-root set; a no-op when the set was never
  /// created.
  pub fn remove_extra_root(&mut self, value: HostValue) {
    unsafe { (*self.node_buffer).remove_extra_root(value) }
  }

  /// Opens a lexical scope: a fresh identifier table chained ahead of the
  /// previous one, which is frozen from here on.
  pub fn push_scope_table(&mut self, len: usize) -> *mut ScopeTable {
    debug_assert!(!self.node_buffer.is_null(), "scope table on a disposed tree");
    unsafe { (*self.node_buffer).push_scope_table(len) }
  }

  /// Resizes the most recently pushed table in place and returns its new
  /// handle; the old handle is dead after this call.
  pub fn grow_current_scope_table(&mut self, new_len: usize) -> *mut ScopeTable {
    debug_assert!(!self.node_buffer.is_null(), "scope table on a disposed tree");
    unsafe { (*self.node_buffer).grow_current_scope_table(new_len) }
  }

  /// Host GC marking callback.
  pub fn mark(&self) {
    if self.node_buffer.is_null() {
      return;
    }
    unsafe {
      let buffer = &*self.node_buffer;
      buffer.mark();
      if let Some(lines) = self.script_lines {
        buffer.host().gc_mark(lines);
      }
    }
  }

  /// Host GC compaction callback, invoked after objects have moved.
  pub fn update_references(&mut self) {
    if self.node_buffer.is_null() {
      return;
    }
    unsafe { (*self.node_buffer).update_references() }
  }

  /// Bytes attributable to this tree's storage.
  pub fn memory_footprint(&self) -> usize {
    if self.node_buffer.is_null() {
      return 0;
    }
    unsafe { (*self.node_buffer).footprint() }
  }

  /// Tears down all node storage, scope tables, and the buffer itself, and
  /// releases the binding reference. Calling it again later is a no-op.
  pub fn dispose(&mut self) {
    if self.node_buffer.is_null() {
      return;
    }
    unsafe { NodeBuffer::free(self.node_buffer) };
    self.node_buffer = null_mut();
  }

  #[cfg(test)]
  pub(crate) fn buffer(&self) -> &NodeBuffer {
    unsafe { &*self.node_buffer }
  }
}

impl Default for Ast {
  fn default() -> Ast {
    Ast::new()
  }
}

impl Drop for Ast {
  fn drop(&mut self) {
    self.dispose();
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use pretty_assertions::assert_eq;
  use proptest::prelude::*;
  use ustr::Ustr;

  use crate::{
    ast_node::{
      node::{IfNode, ListNode, LiteralNode, Node},
      NodeType,
    },
    host::{testing::TestHost, HostValue},
  };
  use super::*;

  #[test]
  fn bucket_split_after_seventeen_header_nodes() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    for _ in 0..17 {
      ast.new_node(NodeType::Nil, size_of::<Node>(), align_of::<Node>());
    }

    let buffer = ast.buffer();
    assert_eq!(buffer.markable_arena().bucket_count(), 1);
    assert_eq!(buffer.unmarkable_arena().bucket_count(), 2);
    assert_eq!(buffer.unmarkable_arena().bucket_lens(), vec![1, 16]);
  }

  #[test]
  fn literal_mark_and_relocation() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let node: *mut LiteralNode = ast.new_node_of(NodeType::Lit);
    let value = HostValue(0xA11CE);
    unsafe { (*node).literal = value };

    ast.mark();
    assert_eq!(host.movable_values(), vec![value]);

    let moved = HostValue(0xB0B);
    host.relocate(value, moved);
    ast.update_references();
    assert_eq!(unsafe { (*node).literal }, moved);
  }

  #[test]
  fn mark_visits_literal_nodes_exactly_once() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let mut expected = Vec::new();
    for serial in 0..25usize {
      let node: *mut LiteralNode = ast.new_node_of(NodeType::Str);
      let value = HostValue(0x1000 + serial);
      unsafe { (*node).literal = value };
      expected.push(value);
      // Interleaved plain nodes; the mark pass never sees them.
      ast.new_node_of::<ListNode>(NodeType::List);
    }

    ast.mark();
    let mut movable = host.movable_values();
    movable.sort_by_key(|value| value.0);
    assert_eq!(movable, expected);
  }

  #[test]
  fn scope_table_growth_only_touches_the_head() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let first = ast.push_scope_table(4);
    unsafe { (*first).ids_mut()[0] = Ustr::from("x") };

    ast.push_scope_table(2);
    let second = ast.grow_current_scope_table(10);

    unsafe {
      assert_eq!((*second).len(), 10);
      assert_eq!((*first).len(), 4);
      assert_eq!((*first).ids()[0], Ustr::from("x"));
    }

    ast.dispose();
    assert_eq!(host.live_allocations(), 0);
  }

  #[test]
  fn dispose_twice_is_inert() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    ast.new_node_of::<IfNode>(NodeType::If);
    ast.push_scope_table(3);

    ast.dispose();
    assert_eq!(host.live_allocations(), 0);

    ast.dispose();
    assert_eq!(host.live_allocations(), 0);
    assert_eq!(ast.memory_footprint(), 0);
  }

  #[test]
  fn footprint_counts_tail_buckets_once() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let empty = ast.memory_footprint();
    assert_eq!(empty, NodeBuffer::ALLOC_SIZE);

    let mut last = empty;
    for _ in 0..40 {
      ast.new_node(NodeType::Block, size_of::<Node>(), align_of::<Node>());
      let now = ast.memory_footprint();
      assert!(now >= last);
      last = now;
    }
    assert!(last > empty);
  }

  #[test]
  fn extra_roots_round_trip() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let stray = HostValue(7);
    // No set exists yet; removal has nothing to do.
    ast.remove_extra_root(stray);

    ast.add_extra_root(stray);
    let set = ast.buffer().mark_set().unwrap();
    assert!(host.set_contains(set, stray));

    ast.mark();
    assert_eq!(host.marked_values(), vec![set]);

    ast.remove_extra_root(stray);
    assert!(!host.set_contains(set, stray));
  }

  #[test]
  fn tokens_and_script_lines_participate_in_marking() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let tokens = HostValue(21);
    let lines = HostValue(33);
    ast.set_tokens(tokens);
    ast.set_script_lines(lines);
    assert_eq!(ast.tokens(), Some(tokens));
    assert_eq!(ast.script_lines(), Some(lines));

    ast.mark();
    assert_eq!(host.marked_values(), vec![tokens, lines]);
  }

  #[test]
  fn delete_node_is_a_documented_no_op() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let node = ast.new_node(NodeType::True, size_of::<Node>(), align_of::<Node>());
    let before = ast.memory_footprint();
    ast.delete_node(node);
    assert_eq!(ast.memory_footprint(), before);
    assert_eq!(ast.buffer().unmarkable_arena().node_count(), 1);
  }

  #[test]
  fn root_survives_gc_callbacks() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let scope = ast.new_node(NodeType::Scope, size_of::<Node>(), align_of::<Node>());
    ast.set_root(scope);
    ast.mark();
    ast.update_references();
    assert_eq!(ast.root(), scope);
  }

  #[test]
  fn system_binding_round_trip() {
    let mut ast = Ast::new();

    let node: *mut ListNode = ast.new_node_of(NodeType::List);
    unsafe { assert_eq!((*node).node.node_type(), NodeType::List) };

    ast.add_extra_root(HostValue(5));
    ast.remove_extra_root(HostValue(5));
    ast.mark();
    assert!(ast.memory_footprint() >= NodeBuffer::ALLOC_SIZE);
  }

  proptest! {
    #[test]
    fn node_pointers_unique_and_aligned(
      requests in proptest::collection::vec((1usize..=3, 0usize..3), 1..128)
    ) {
      let host = TestHost::new();
      let mut ast = Ast::with_host(host.clone());
      let mut seen = HashSet::new();

      for (multiple, align_index) in requests {
        let alignment = [4usize, 8, 16][align_index];
        let size = size_of::<Node>() * multiple;
        let node = ast.new_node(NodeType::Block, size, alignment);
        prop_assert_eq!(node as usize % alignment, 0);
        prop_assert!(seen.insert(node as usize));
      }
    }
  }
}
