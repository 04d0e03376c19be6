//! SVA primitive-node graph
//!
//! The upstream elaborator hands the property compiler a directed graph of
//! "instance" nodes, each tagged with an SVA primitive kind and wired
//! together through nets. A net is either driven by another primitive
//! instance or stands for an external boolean signal that has already been
//! mapped into the target netlist.
//!
//! Sampled-value primitives (`$rose`, `$fell`, `$stable`, `$past` and their
//! operator analogues) are deliberately *not* resolved to their driver: the
//! nets they drive are treated as opaque booleans by the compiler.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use svasynth_netlist::Bit;
use thiserror::Error;

/// Errors raised while reading the primitive graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AstError {
    #[error("instance {instance} is missing required attribute {attribute}")]
    MissingAttribute {
        instance: String,
        attribute: &'static str,
    },
    #[error("instance {instance} has malformed attribute {attribute}: {value:?}")]
    InvalidAttribute {
        instance: String,
        attribute: &'static str,
        value: String,
    },
    #[error("net has no registered clock edge")]
    MissingClockEdge,
}

/// Unique identifier for a primitive instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

/// Unique identifier for a net in the primitive graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AstNetId(pub u32);

/// SVA primitive kinds recognized by the compiler.
///
/// The set mirrors the upstream elaborator's primitive inventory: the kinds
/// the compiler lowers, the kinds it recognizes only to reject, and the
/// sampled-value kinds it treats as opaque booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SvaPrim {
    // Property roots
    ImmediateAssert,
    ImmediateAssume,
    ImmediateCover,
    Assert,
    Assume,
    Cover,

    // Property structure
    At,
    DisableIff,
    SEventually,
    OverlappedImplication,
    NonOverlappedImplication,
    Not,
    Until,
    SUntil,
    UntilWith,
    SUntilWith,

    // Sequence operators
    SeqConcat,
    ConsecutiveRepeat,
    Throughout,

    // Recognized but unsupported sequence operators
    NonConsecutiveRepeat,
    GotoRepeat,
    FirstMatch,
    SeqAnd,
    SeqOr,
    Intersect,
    Within,

    // Sampled-value functions, opaque to the compiler
    Rose,
    Fell,
    Stable,
    Past,
    OperSampled,
    OperStable,
}

impl SvaPrim {
    /// Sampled-value primitives are never resolved as sequence drivers
    pub fn is_sampled_value(&self) -> bool {
        matches!(
            self,
            SvaPrim::Rose
                | SvaPrim::Fell
                | SvaPrim::Stable
                | SvaPrim::Past
                | SvaPrim::OperSampled
                | SvaPrim::OperStable
        )
    }

    /// Primitive name as it appears in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            SvaPrim::ImmediateAssert => "immediate_assert",
            SvaPrim::ImmediateAssume => "immediate_assume",
            SvaPrim::ImmediateCover => "immediate_cover",
            SvaPrim::Assert => "assert",
            SvaPrim::Assume => "assume",
            SvaPrim::Cover => "cover",
            SvaPrim::At => "at",
            SvaPrim::DisableIff => "disable_iff",
            SvaPrim::SEventually => "s_eventually",
            SvaPrim::OverlappedImplication => "overlapped_implication",
            SvaPrim::NonOverlappedImplication => "non_overlapped_implication",
            SvaPrim::Not => "not",
            SvaPrim::Until => "until",
            SvaPrim::SUntil => "s_until",
            SvaPrim::UntilWith => "until_with",
            SvaPrim::SUntilWith => "s_until_with",
            SvaPrim::SeqConcat => "seq_concat",
            SvaPrim::ConsecutiveRepeat => "consecutive_repeat",
            SvaPrim::Throughout => "throughout",
            SvaPrim::NonConsecutiveRepeat => "non_consecutive_repeat",
            SvaPrim::GotoRepeat => "goto_repeat",
            SvaPrim::FirstMatch => "first_match",
            SvaPrim::SeqAnd => "seq_and",
            SvaPrim::SeqOr => "seq_or",
            SvaPrim::Intersect => "intersect",
            SvaPrim::Within => "within",
            SvaPrim::Rose => "rose",
            SvaPrim::Fell => "fell",
            SvaPrim::Stable => "stable",
            SvaPrim::Past => "past",
            SvaPrim::OperSampled => "oper_sampled",
            SvaPrim::OperStable => "oper_stable",
        }
    }
}

/// A primitive instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Unique identifier
    pub id: InstanceId,
    /// Primitive kind
    pub prim: SvaPrim,
    /// Instance name from the source description
    pub name: String,
    /// True when the name was written by the user (as opposed to generated)
    pub user_declared: bool,
    /// String attributes (`sva:low`, `sva:high`, user attributes)
    pub attributes: IndexMap<String, String>,
    /// First operand net
    pub input: Option<AstNetId>,
    /// Second operand net
    pub input1: Option<AstNetId>,
    /// Third operand net
    pub input2: Option<AstNetId>,
    /// Control net
    pub control: Option<AstNetId>,
}

impl Instance {
    fn attribute(&self, key: &'static str) -> Result<&str, AstError> {
        self.attributes
            .get(key)
            .map(String::as_str)
            .ok_or(AstError::MissingAttribute {
                instance: self.name.clone(),
                attribute: key,
            })
    }
}

/// A net in the primitive graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNet {
    /// Unique identifier
    pub id: AstNetId,
    /// Driving primitive instance, if any
    pub driver: Option<InstanceId>,
    /// True when the net has more than one driver; such nets are opaque
    pub multiple_driven: bool,
    /// Mapping of the net into the target netlist, for nets consumed as
    /// plain booleans
    pub bit: Option<Bit>,
}

/// Clock event extracted by the upstream elaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockEdge {
    /// The clock signal in the target netlist
    pub clock: Bit,
    /// True for `posedge`, false for `negedge`
    pub posedge: bool,
}

/// The primitive graph of one or more SVA properties
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SvaGraph {
    /// All instances, indexed by `InstanceId`
    pub instances: Vec<Instance>,
    /// All nets, indexed by `AstNetId`
    pub nets: Vec<AstNet>,
    /// Clock edges registered per clock-specification net
    clock_edges: IndexMap<u32, ClockEdge>,
}

impl SvaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a net standing for an external boolean already mapped to `bit`
    pub fn add_ext_net(&mut self, bit: Bit) -> AstNetId {
        let id = AstNetId(self.nets.len() as u32);
        self.nets.push(AstNet {
            id,
            driver: None,
            multiple_driven: false,
            bit: Some(bit),
        });
        id
    }

    /// Add an undriven, unmapped net (to be driven by a primitive instance)
    pub fn add_net(&mut self) -> AstNetId {
        let id = AstNetId(self.nets.len() as u32);
        self.nets.push(AstNet {
            id,
            driver: None,
            multiple_driven: false,
            bit: None,
        });
        id
    }

    /// Add a primitive instance with no operands connected yet
    pub fn add_instance(&mut self, prim: SvaPrim, name: impl Into<String>) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(Instance {
            id,
            prim,
            name: name.into(),
            user_declared: false,
            attributes: IndexMap::new(),
            input: None,
            input1: None,
            input2: None,
            control: None,
        });
        id
    }

    /// Create a net driven by `inst` and return it
    pub fn drive(&mut self, inst: InstanceId) -> AstNetId {
        let net = self.add_net();
        self.nets[net.0 as usize].driver = Some(inst);
        net
    }

    /// Register the clock edge extracted for a clock-specification net
    pub fn register_clock_edge(&mut self, net: AstNetId, edge: ClockEdge) {
        self.clock_edges.insert(net.0, edge);
    }

    /// Retrieve the clock edge registered for a clock-specification net
    pub fn clock_edge(&self, net: AstNetId) -> Result<ClockEdge, AstError> {
        self.clock_edges
            .get(&net.0)
            .copied()
            .ok_or(AstError::MissingClockEdge)
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0 as usize]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0 as usize]
    }

    pub fn net(&self, id: AstNetId) -> &AstNet {
        &self.nets[id.0 as usize]
    }

    /// Resolve a net to the SVA primitive instance driving it.
    ///
    /// Returns `None` for undriven or multiply-driven nets and for nets
    /// driven by a sampled-value primitive; all of those are consumed as
    /// opaque booleans.
    pub fn driver(&self, net: AstNetId) -> Option<InstanceId> {
        let net = self.net(net);
        if net.multiple_driven {
            return None;
        }
        let inst = net.driver?;
        if self.instance(inst).prim.is_sampled_value() {
            return None;
        }
        Some(inst)
    }

    /// The netlist bit a boolean net maps to.
    ///
    /// The upstream elaborator guarantees the mapping exists for every net
    /// the compiler consumes as a boolean; a missing mapping is a bug in the
    /// caller, not in user input.
    pub fn bool_bit(&self, net: AstNetId) -> Bit {
        self.net(net)
            .bit
            .unwrap_or_else(|| panic!("net {} consumed as boolean but never mapped", net.0))
    }

    /// Driver of an instance's first operand, resolved as in [`Self::driver`]
    pub fn ast_input(&self, inst: InstanceId) -> Option<InstanceId> {
        self.instance(inst).input.and_then(|n| self.driver(n))
    }

    /// Driver of an instance's second operand
    pub fn ast_input1(&self, inst: InstanceId) -> Option<InstanceId> {
        self.instance(inst).input1.and_then(|n| self.driver(n))
    }

    /// Driver of an instance's third operand
    pub fn ast_input2(&self, inst: InstanceId) -> Option<InstanceId> {
        self.instance(inst).input2.and_then(|n| self.driver(n))
    }
}

/// Cycle-delay or repetition range carried as `sva:low` / `sva:high`
/// attributes. `high == None` stands for `$` (unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub low: u32,
    pub high: Option<u32>,
}

impl DelayRange {
    /// Parse the range attributes of a `##[N:M]` or `[*N:M]` instance
    pub fn from_instance(inst: &Instance) -> Result<Self, AstError> {
        let low_s = inst.attribute("sva:low")?;
        let low = low_s
            .parse::<u32>()
            .map_err(|_| AstError::InvalidAttribute {
                instance: inst.name.clone(),
                attribute: "sva:low",
                value: low_s.to_string(),
            })?;

        let high_s = inst.attribute("sva:high")?;
        let high = if high_s == "$" {
            None
        } else {
            Some(
                high_s
                    .parse::<u32>()
                    .map_err(|_| AstError::InvalidAttribute {
                        instance: inst.name.clone(),
                        attribute: "sva:high",
                        value: high_s.to_string(),
                    })?,
            )
        };

        Ok(DelayRange { low, high })
    }

    /// True when the range is unbounded (`sva:high == "$"`)
    pub fn is_unbounded(&self) -> bool {
        self.high.is_none()
    }
}
