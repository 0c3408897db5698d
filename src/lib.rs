/*!

Node storage for a parser front end. The parser allocates abstract syntax tree
nodes out of two growable bucket arenas owned by an [`Ast`] handle: one arena
for node types that embed a reference to a host-managed literal value, one for
everything else. Keeping the literal-bearing nodes in their own arena lets the
host garbage collector's mark and compaction passes visit exactly the nodes
that matter and skip the rest of the tree wholesale.

All memory and all managed-value operations go through a [`Host`] binding, a
small capability table supplied by the embedding runtime, so the same arena
code runs unmodified inside different hosts. Nodes are never freed one at a
time; the whole tree is torn down in one pass when its handle is disposed.

*/

pub mod ast;
pub mod ast_node;
pub mod host;
pub mod util;

pub use ast::Ast;
pub use ast_node::{
  flags::{NodeFlag, NodeFlags},
  node::{
    node_init, IfNode, ListNode, LiteralNode, Node, ScopeNode, SourcePosition, SourceSpan,
    UNSET_NODE_ID,
  },
  node_type_name,
  scope_table::ScopeTable,
  NodePtr, NodeType,
};
pub use host::{system_host, Host, HostRef, HostValue, SystemHost};
