/*!

Utilities to fill a tree with randomized nodes for stress runs.

*/

use rand::Rng;

use crate::{
  ast::Ast,
  ast_node::{
    node::{IfNode, ListNode, LiteralNode, Node},
    NodePtr, NodeType,
  },
  host::HostValue,
};

/// Tags the generator draws from; a mix of literal-bearing and plain shapes.
const GENERATED_TYPES: &[NodeType] = &[
  NodeType::Block,
  NodeType::If,
  NodeType::List,
  NodeType::Call,
  NodeType::Lit,
  NodeType::Str,
  NodeType::DRegx,
];

/// Allocates `count` random nodes into `ast`, giving each literal payload a
/// distinct managed handle, and returns every pointer handed out.
pub fn fill_random_nodes(ast: &mut Ast, count: usize) -> Vec<NodePtr> {
  let mut rng = rand::rng();
  let mut nodes = Vec::with_capacity(count);

  for serial in 0..count {
    let node_type = GENERATED_TYPES[rng.random_range(0..GENERATED_TYPES.len())];
    let node = match node_type {
      _ if node_type.markable() => {
        let node: *mut LiteralNode = ast.new_node_of(node_type);
        unsafe { (*node).literal = HostValue(0x1_0000 + serial) };
        node as NodePtr
      }
      NodeType::If => ast.new_node_of::<IfNode>(node_type) as NodePtr,
      NodeType::List => ast.new_node_of::<ListNode>(node_type) as NodePtr,
      _ => ast.new_node(node_type, size_of::<Node>(), align_of::<Node>()),
    };
    nodes.push(node);
  }

  nodes
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::host::testing::TestHost;
  use super::*;

  #[test]
  fn random_fill_marks_cleanly_and_frees() {
    let host = TestHost::new();
    let mut ast = Ast::with_host(host.clone());

    let nodes = fill_random_nodes(&mut ast, 500);
    assert_eq!(nodes.len(), 500);

    let literal_count = nodes
      .iter()
      .filter(|&&node| unsafe { (*node).node_type().markable() })
      .count();

    ast.mark();
    assert_eq!(host.movable_values().len(), literal_count);

    ast.dispose();
    assert_eq!(host.live_allocations(), 0);
  }
}
