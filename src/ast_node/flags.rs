use enumflags2::{bitflags, BitFlags};

#[bitflags]
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeFlag {
  /// Stamped at initialization so generic object-type probes classify the
  /// record as a syntax node rather than a managed object.
  SyntaxNode,
  /// Statement opens a new source line; consumed downstream for line events.
  Newline,
}

pub type NodeFlags = BitFlags<NodeFlag, u32>;
