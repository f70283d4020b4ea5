//! Output record kinds and the embedding table.

/// Record kinds with publishing behavior of their own.
///
/// Resolved once from the record's type name; any type without special
/// handling is [`RecordKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    AttackFlow,
    AttackAction,
    AttackAsset,
    AttackCondition,
    AttackOperator,
    Process,
    NetworkTraffic,
    Ipv4Addr,
    Ipv6Addr,
    MacAddr,
    DomainName,
    Grouping,
    Note,
    ObservedData,
    Opinion,
    Report,
    MalwareAnalysis,
    Other,
}

impl RecordKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "attack-flow" => Self::AttackFlow,
            "attack-action" => Self::AttackAction,
            "attack-asset" => Self::AttackAsset,
            "attack-condition" => Self::AttackCondition,
            "attack-operator" => Self::AttackOperator,
            "process" => Self::Process,
            "network-traffic" => Self::NetworkTraffic,
            "ipv4-addr" => Self::Ipv4Addr,
            "ipv6-addr" => Self::Ipv6Addr,
            "mac-addr" => Self::MacAddr,
            "domain-name" => Self::DomainName,
            "grouping" => Self::Grouping,
            "note" => Self::Note,
            "observed-data" => Self::ObservedData,
            "opinion" => Self::Opinion,
            "report" => Self::Report,
            "malware-analysis" => Self::MalwareAnalysis,
            _ => Self::Other,
        }
    }

    /// Attack Flow object types, which declare the extension.
    pub fn is_extension_type(self) -> bool {
        matches!(
            self,
            Self::AttackFlow
                | Self::AttackAction
                | Self::AttackAsset
                | Self::AttackCondition
                | Self::AttackOperator
        )
    }

    /// Kinds that take part in start-ref computation.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::AttackAction | Self::AttackCondition)
    }

    /// Kinds that can follow an action, operator, or condition.
    fn is_effect(self) -> bool {
        matches!(
            self,
            Self::AttackAction | Self::AttackOperator | Self::AttackCondition
        )
    }
}

/// Channel of a condition's true branch.
pub const TRUE_BRANCH: &str = "true_anchor";
/// Channel of a condition's false branch.
pub const FALSE_BRANCH: &str = "false_anchor";

/// How one parent/child connection is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embed {
    /// Set the parent's single-reference field, if still empty.
    ParentSlot(&'static str),
    /// Append to the parent's reference list.
    ParentList(&'static str),
    /// Set the child's single-reference field to the parent, if still empty.
    ChildSlot(&'static str),
    /// Emit a standalone relationship record.
    Relationship,
}

/// The embedding rule for a `child` connected to `parent` through `via`.
///
/// Slot rules are tried in order of the returned candidates; the caller
/// falls back to [`Embed::Relationship`] when every candidate slot is
/// already filled.
pub fn embed_rule(parent: RecordKind, child: RecordKind, via: Option<&str>) -> &'static [Embed] {
    use Embed::*;
    use RecordKind::*;

    match (parent, child) {
        (AttackAction, Process) => &[ParentSlot("command_ref")],
        (AttackAction, AttackAsset) => &[ParentList("asset_refs")],
        (AttackAction, c) if c.is_effect() => &[ParentList("effect_refs")],
        (AttackAsset, _) => &[ParentSlot("object_ref")],
        (AttackCondition, c) if c.is_effect() => match via {
            Some(TRUE_BRANCH) => &[ParentList("on_true_refs")],
            Some(FALSE_BRANCH) => &[ParentList("on_false_refs")],
            _ => &[Relationship],
        },
        (AttackOperator, c) if c.is_effect() => &[ParentList("effect_refs")],
        (NetworkTraffic, NetworkTraffic) => &[ParentSlot("dst_ref"), ChildSlot("src_ref")],
        (NetworkTraffic, _) => &[ParentSlot("dst_ref")],
        (Ipv4Addr | Ipv6Addr | MacAddr | DomainName, NetworkTraffic) => &[ChildSlot("src_ref")],
        (Grouping | Note | ObservedData | Opinion | Report, _) => &[ParentList("object_refs")],
        (MalwareAnalysis, _) => &[ParentList("analysis_sco_refs")],
        _ => &[Relationship],
    }
}
