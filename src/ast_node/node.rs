/*!

The node header and the typed views laid over it. Every allocation handed out
by the arenas begins with a [`Node`] header; the payload that follows varies
by type tag. Literal-bearing tags all share the [`LiteralNode`] prefix layout,
which is what lets the GC passes reach the one managed reference at a fixed
offset without knowing the concrete node shape.

*/

use std::fmt::{Display, Formatter};
use std::ptr;

use crate::{
  ast_node::{
    flags::{NodeFlag, NodeFlags},
    scope_table::ScopeTable,
    NodeType,
  },
  host::HostValue,
};

/// Nodes are reached through raw pointers for the AST's whole lifetime; the
/// arena owns the storage and the parser mutates nodes freely while the tree
/// is being built.
pub type NodePtr = *mut Node;

/// Value of `node_id` before the parser assigns one.
pub const UNSET_NODE_ID: i32 = -1;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct SourcePosition {
  pub lineno: i32,
  pub column: i32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct SourceSpan {
  pub beg: SourcePosition,
  pub end: SourcePosition,
}

/// Fixed header of every syntax node.
#[repr(C)]
pub struct Node {
  flags: NodeFlags,
  node_type: NodeType,
  pub loc: SourceSpan,
  pub node_id: i32,
}

impl Node {
  #[inline(always)]
  pub fn node_type(&self) -> NodeType {
    self.node_type
  }

  #[inline(always)]
  pub fn flags(&self) -> NodeFlags {
    self.flags
  }

  /// Whether the header still passes for a managed object in generic type
  /// probes.
  #[inline(always)]
  pub fn imitates_object(&self) -> bool {
    self.flags.contains(NodeFlag::SyntaxNode)
  }

  #[inline(always)]
  pub fn newline(&self) -> bool {
    self.flags.contains(NodeFlag::Newline)
  }

  #[inline(always)]
  pub fn set_newline(&mut self) {
    self.flags.insert(NodeFlag::Newline);
  }

  /// Changes the type tag in place. A change may not move the node across
  /// the markable/unmarkable divide: the original classification decided
  /// which arena holds the node, and the GC passes trust that placement.
  pub fn set_type(&mut self, new_type: NodeType) {
    #[cfg(feature = "gc_debug")]
    if self.node_type.markable() != new_type.markable() {
      panic!(
        "node type changed: {} -> {}",
        self.node_type.name(),
        new_type.name()
      );
    }
    self.node_type = new_type;
  }

  #[cfg(test)]
  pub(crate) fn set_type_unchecked(&mut self, new_type: NodeType) {
    self.node_type = new_type;
  }
}

impl Display for Node {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "node<{}>", self.node_type.name())
  }
}

/// Stamps a freshly allocated node: the imitation header flag, the type tag,
/// a zeroed source span, and the unset node id. The payload past the header
/// is left for the caller.
pub fn node_init(node: NodePtr, node_type: NodeType) {
  unsafe {
    ptr::write(
      node,
      Node {
        flags: NodeFlag::SyntaxNode.into(),
        node_type,
        loc: SourceSpan::default(),
        node_id: UNSET_NODE_ID,
      },
    );
  }
}

/// Payload layout shared by every literal-bearing tag. The literal is the one
/// managed reference the GC passes mark and relocate.
#[repr(C)]
pub struct LiteralNode {
  pub node: Node,
  pub literal: HostValue,
}

/// Cons-style list element.
#[repr(C)]
pub struct ListNode {
  pub node: Node,
  pub head: NodePtr,
  pub next: NodePtr,
}

/// Two-armed conditional.
#[repr(C)]
pub struct IfNode {
  pub node: Node,
  pub cond: NodePtr,
  pub body: NodePtr,
  pub else_body: NodePtr,
}

/// Lexical scope: its local-variable table plus the body it encloses.
#[repr(C)]
pub struct ScopeNode {
  pub node: Node,
  pub table: *mut ScopeTable,
  pub args: NodePtr,
  pub body: NodePtr,
}

#[cfg(test)]
mod tests {
  use std::mem::MaybeUninit;

  use super::*;

  #[test]
  fn init_stamps_defaults() {
    let mut storage = MaybeUninit::<Node>::uninit();
    node_init(storage.as_mut_ptr(), NodeType::Call);
    let node = unsafe { storage.assume_init_ref() };

    assert_eq!(node.node_type(), NodeType::Call);
    assert_eq!(node.node_id, UNSET_NODE_ID);
    assert_eq!(node.loc, SourceSpan::default());
    assert!(node.imitates_object());
    assert!(!node.newline());
  }

  #[test]
  fn newline_flag_round_trip() {
    let mut storage = MaybeUninit::<Node>::uninit();
    node_init(storage.as_mut_ptr(), NodeType::Block);
    let node = unsafe { storage.assume_init_mut() };

    node.set_newline();
    assert!(node.newline());
    assert!(node.imitates_object());
  }

  #[test]
  fn retagging_within_a_partition() {
    let mut storage = MaybeUninit::<Node>::uninit();
    node_init(storage.as_mut_ptr(), NodeType::Str);
    let node = unsafe { storage.assume_init_mut() };

    node.set_type(NodeType::DStr);
    assert_eq!(node.node_type(), NodeType::DStr);
  }

  #[cfg(feature = "gc_debug")]
  #[test]
  #[should_panic(expected = "node type changed")]
  fn retagging_across_partitions_aborts() {
    let mut storage = MaybeUninit::<Node>::uninit();
    node_init(storage.as_mut_ptr(), NodeType::Str);
    let node = unsafe { storage.assume_init_mut() };

    node.set_type(NodeType::If);
  }

  #[test]
  fn literal_prefix_layout() {
    assert_eq!(std::mem::offset_of!(LiteralNode, node), 0);
    assert!(size_of::<Node>() < size_of::<LiteralNode>());
  }
}
