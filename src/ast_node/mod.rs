/*!

The syntax-node records and the storage that backs them. Nodes are
variable-size, variable-alignment records with a fixed [`Node`] header. The
tag set is closed: a small, fixed subset of tags embeds one reference to a
host-managed literal value, and those nodes live in their own arena so the GC
passes can reach every managed reference without walking the rest of the
tree.

*/

pub mod allocator;
pub mod buffer;
pub mod flags;
pub mod node;
pub mod scope_table;

pub use node::{Node, NodePtr};

/// A `*mut Void` is a pointer to a `u8`
pub type Void = u8;

/// Capacity of each arena's first (embedded) bucket: room for 16 header-sized
/// nodes.
pub const NODE_BUF_DEFAULT_SIZE: usize = 16 * size_of::<Node>();

macro_rules! node_types {
  ($($variant:ident => $name:literal),* $(,)?) => {
    /// Type tag of a syntax node. Raw tags are the declaration-order
    /// discriminants; [`node_type_name`] maps them back to names.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    #[repr(u16)]
    pub enum NodeType {
      $($variant),*
    }

    impl NodeType {
      /// Every tag, in raw-discriminant order.
      pub const ALL: &'static [NodeType] = &[$(NodeType::$variant),*];

      /// Canonical tag name, as it appears in diagnostics.
      pub const fn name(self) -> &'static str {
        match self {
          $(NodeType::$variant => $name),*
        }
      }
    }
  };
}

node_types! {
  Scope     => "NODE_SCOPE",
  Block     => "NODE_BLOCK",
  If        => "NODE_IF",
  Unless    => "NODE_UNLESS",
  Case      => "NODE_CASE",
  Case2     => "NODE_CASE2",
  Case3     => "NODE_CASE3",
  When      => "NODE_WHEN",
  In        => "NODE_IN",
  While     => "NODE_WHILE",
  Until     => "NODE_UNTIL",
  Iter      => "NODE_ITER",
  For       => "NODE_FOR",
  ForMasgn  => "NODE_FOR_MASGN",
  Break     => "NODE_BREAK",
  Next      => "NODE_NEXT",
  Redo      => "NODE_REDO",
  Retry     => "NODE_RETRY",
  Begin     => "NODE_BEGIN",
  Rescue    => "NODE_RESCUE",
  Resbody   => "NODE_RESBODY",
  Ensure    => "NODE_ENSURE",
  And       => "NODE_AND",
  Or        => "NODE_OR",
  Masgn     => "NODE_MASGN",
  Lasgn     => "NODE_LASGN",
  Dasgn     => "NODE_DASGN",
  Gasgn     => "NODE_GASGN",
  Iasgn     => "NODE_IASGN",
  Cdecl     => "NODE_CDECL",
  Cvasgn    => "NODE_CVASGN",
  OpAsgn1   => "NODE_OP_ASGN1",
  OpAsgn2   => "NODE_OP_ASGN2",
  OpAsgnAnd => "NODE_OP_ASGN_AND",
  OpAsgnOr  => "NODE_OP_ASGN_OR",
  OpCdecl   => "NODE_OP_CDECL",
  Call      => "NODE_CALL",
  OpCall    => "NODE_OPCALL",
  FCall     => "NODE_FCALL",
  VCall     => "NODE_VCALL",
  QCall     => "NODE_QCALL",
  Super     => "NODE_SUPER",
  ZSuper    => "NODE_ZSUPER",
  List      => "NODE_LIST",
  ZList     => "NODE_ZLIST",
  Values    => "NODE_VALUES",
  Hash      => "NODE_HASH",
  Return    => "NODE_RETURN",
  Yield     => "NODE_YIELD",
  LVar      => "NODE_LVAR",
  DVar      => "NODE_DVAR",
  GVar      => "NODE_GVAR",
  IVar      => "NODE_IVAR",
  Const     => "NODE_CONST",
  CVar      => "NODE_CVAR",
  NthRef    => "NODE_NTH_REF",
  BackRef   => "NODE_BACK_REF",
  Match     => "NODE_MATCH",
  Match2    => "NODE_MATCH2",
  Match3    => "NODE_MATCH3",
  Lit       => "NODE_LIT",
  Str       => "NODE_STR",
  DStr      => "NODE_DSTR",
  XStr      => "NODE_XSTR",
  DXStr     => "NODE_DXSTR",
  EvStr     => "NODE_EVSTR",
  DRegx     => "NODE_DREGX",
  Once      => "NODE_ONCE",
  Args      => "NODE_ARGS",
  ArgsAux   => "NODE_ARGS_AUX",
  OptArg    => "NODE_OPT_ARG",
  KwArg     => "NODE_KW_ARG",
  PostArg   => "NODE_POSTARG",
  ArgsCat   => "NODE_ARGSCAT",
  ArgsPush  => "NODE_ARGSPUSH",
  Splat     => "NODE_SPLAT",
  BlockPass => "NODE_BLOCK_PASS",
  Defn      => "NODE_DEFN",
  Defs      => "NODE_DEFS",
  Alias     => "NODE_ALIAS",
  VAlias    => "NODE_VALIAS",
  Undef     => "NODE_UNDEF",
  Class     => "NODE_CLASS",
  Module    => "NODE_MODULE",
  SClass    => "NODE_SCLASS",
  Colon2    => "NODE_COLON2",
  Colon3    => "NODE_COLON3",
  Dot2      => "NODE_DOT2",
  Dot3      => "NODE_DOT3",
  Flip2     => "NODE_FLIP2",
  Flip3     => "NODE_FLIP3",
  SelfRef   => "NODE_SELF",
  Nil       => "NODE_NIL",
  True      => "NODE_TRUE",
  False     => "NODE_FALSE",
  ErrInfo   => "NODE_ERRINFO",
  Defined   => "NODE_DEFINED",
  Postexe   => "NODE_POSTEXE",
  DSym      => "NODE_DSYM",
  AttrAsgn  => "NODE_ATTRASGN",
  Lambda    => "NODE_LAMBDA",
  AryPtn    => "NODE_ARYPTN",
  HshPtn    => "NODE_HSHPTN",
  FndPtn    => "NODE_FNDPTN",
  Error     => "NODE_ERROR",
}

impl NodeType {
  /// Whether this tag's payload embeds one host-managed literal value. The
  /// set is fixed at compile time, and a node never changes sides after
  /// allocation.
  #[inline(always)]
  pub const fn markable(self) -> bool {
    matches!(
      self,
      NodeType::Match
        | NodeType::Lit
        | NodeType::Str
        | NodeType::XStr
        | NodeType::DStr
        | NodeType::DXStr
        | NodeType::DRegx
        | NodeType::DSym
    )
  }

  #[inline(always)]
  pub const fn raw(self) -> u16 {
    self as u16
  }

  pub fn from_raw(raw: u16) -> Option<NodeType> {
    NodeType::ALL.get(raw as usize).copied()
  }
}

impl std::fmt::Display for NodeType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.name())
  }
}

/// Name lookup for a raw tag. Unknown tags yield `None` rather than failing.
pub fn node_type_name(raw: u16) -> Option<&'static str> {
  NodeType::from_raw(raw).map(NodeType::name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn markable_tag_set_is_fixed() {
    let markable: Vec<NodeType> = NodeType::ALL
      .iter()
      .copied()
      .filter(|node_type| node_type.markable())
      .collect();
    assert_eq!(
      markable,
      vec![
        NodeType::Match,
        NodeType::Lit,
        NodeType::Str,
        NodeType::DStr,
        NodeType::XStr,
        NodeType::DXStr,
        NodeType::DRegx,
        NodeType::DSym,
      ]
    );
  }

  #[test]
  fn raw_tag_round_trip() {
    for node_type in NodeType::ALL {
      assert_eq!(NodeType::from_raw(node_type.raw()), Some(*node_type));
    }
    assert_eq!(node_type_name(NodeType::Lit.raw()), Some("NODE_LIT"));
    assert_eq!(node_type_name(u16::MAX), None);
  }

  #[test]
  fn display_uses_tag_names() {
    assert_eq!(NodeType::SelfRef.to_string(), "NODE_SELF");
    assert_eq!(NodeType::OpAsgn1.to_string(), "NODE_OP_ASGN1");
  }
}
