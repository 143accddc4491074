use serde_repr::Deserialize_repr;
use std::fmt::{Display, Formatter};

/// Describes the location of your feature flag and setting data within the ConfigCat CDN.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum DataGovernance {
    /// Feature flags are published to all global CDN nodes.
    #[default]
    Global,
    /// Feature flags are published to CDN nodes only in the EU.
    EU,
}

#[derive(Debug, Deserialize_repr, PartialEq, Clone, Copy)]
#[repr(u8)]
pub enum RedirectMode {
    No = 0,
    Should = 1,
    Force = 2,
}

/// Describes how much flag data is available to a refresh policy.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ClientCacheState {
    /// No config JSON is available, neither from the cache nor from the network.
    NoFlagData,
    /// Only cached (possibly outdated) config JSON is available.
    HasCachedFlagDataOnly,
    /// The config JSON is fresh according to the polling mode.
    HasUpToDateFlagData,
}

/// The type of a feature flag or setting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize_repr)]
#[repr(u8)]
pub enum SettingType {
    /// The on/off type (feature flag).
    Bool = 0,
    /// The text setting type.
    String = 1,
    /// The whole number setting type.
    Int = 2,
    /// The decimal number setting type.
    Float = 3,
}

impl Display for SettingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SettingType::Bool => "Bool",
            SettingType::String => "String",
            SettingType::Int => "Int",
            SettingType::Float => "Float",
        })
    }
}

/// Segment comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize_repr)]
#[repr(u8)]
pub enum SegmentComparator {
    /// The conditions of the segment must evaluate to true.
    IsIn = 0,
    /// The conditions of the segment must evaluate to false.
    IsNotIn = 1,
}

impl Display for SegmentComparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SegmentComparator::IsIn => "IS IN SEGMENT",
            SegmentComparator::IsNotIn => "IS NOT IN SEGMENT",
        })
    }
}

/// Prerequisite flag comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize_repr)]
#[repr(u8)]
pub enum PrerequisiteFlagComparator {
    /// The prerequisite flag's value must equal the comparison value.
    Eq = 0,
    /// The prerequisite flag's value must differ from the comparison value.
    NotEq = 1,
}

impl Display for PrerequisiteFlagComparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PrerequisiteFlagComparator::Eq => "EQUALS",
            PrerequisiteFlagComparator::NotEq => "NOT EQUALS",
        })
    }
}

/// User Object attribute comparison operator.
///
/// `*Hashed` variants compare the salted SHA256 hashes of the values.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Deserialize_repr)]
#[repr(u8)]
pub enum UserComparator {
    OneOf = 0,
    NotOneOf = 1,
    Contains = 2,
    NotContains = 3,
    OneOfSemver = 4,
    NotOneOfSemver = 5,
    LessSemver = 6,
    LessEqSemver = 7,
    GreaterSemver = 8,
    GreaterEqSemver = 9,
    EqNum = 10,
    NotEqNum = 11,
    LessNum = 12,
    LessEqNum = 13,
    GreaterNum = 14,
    GreaterEqNum = 15,
    OneOfHashed = 16,
    NotOneOfHashed = 17,
    BeforeDateTime = 18,
    AfterDateTime = 19,
    EqHashed = 20,
    NotEqHashed = 21,
    StartsWithAnyOfHashed = 22,
    NotStartsWithAnyOfHashed = 23,
    EndsWithAnyOfHashed = 24,
    NotEndsWithAnyOfHashed = 25,
    ArrayContainsAnyOfHashed = 26,
    ArrayNotContainsAnyOfHashed = 27,
    Eq = 28,
    NotEq = 29,
    StartsWithAnyOf = 30,
    NotStartsWithAnyOf = 31,
    EndsWithAnyOf = 32,
    NotEndsWithAnyOf = 33,
    ArrayContainsAnyOf = 34,
    ArrayNotContainsAnyOf = 35,
}

impl Display for UserComparator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use UserComparator::*;
        f.write_str(match self {
            OneOf | OneOfSemver | OneOfHashed => "IS ONE OF",
            NotOneOf | NotOneOfSemver | NotOneOfHashed => "IS NOT ONE OF",
            Contains => "CONTAINS ANY OF",
            NotContains => "NOT CONTAINS ANY OF",
            LessSemver | LessNum => "<",
            LessEqSemver | LessEqNum => "<=",
            GreaterSemver | GreaterNum => ">",
            GreaterEqSemver | GreaterEqNum => ">=",
            EqNum => "=",
            NotEqNum => "!=",
            BeforeDateTime => "BEFORE",
            AfterDateTime => "AFTER",
            Eq | EqHashed => "EQUALS",
            NotEq | NotEqHashed => "NOT EQUALS",
            StartsWithAnyOf | StartsWithAnyOfHashed => "STARTS WITH ANY OF",
            NotStartsWithAnyOf | NotStartsWithAnyOfHashed => "NOT STARTS WITH ANY OF",
            EndsWithAnyOf | EndsWithAnyOfHashed => "ENDS WITH ANY OF",
            NotEndsWithAnyOf | NotEndsWithAnyOfHashed => "NOT ENDS WITH ANY OF",
            ArrayContainsAnyOf | ArrayContainsAnyOfHashed => "ARRAY CONTAINS ANY OF",
            ArrayNotContainsAnyOf | ArrayNotContainsAnyOfHashed => "ARRAY NOT CONTAINS ANY OF",
        })
    }
}

impl UserComparator {
    pub(crate) fn is_sensitive(&self) -> bool {
        use UserComparator::*;
        matches!(
            self,
            OneOfHashed
                | NotOneOfHashed
                | EqHashed
                | NotEqHashed
                | StartsWithAnyOfHashed
                | NotStartsWithAnyOfHashed
                | EndsWithAnyOfHashed
                | NotEndsWithAnyOfHashed
                | ArrayContainsAnyOfHashed
                | ArrayNotContainsAnyOfHashed
        )
    }

    pub(crate) fn is_date(&self) -> bool {
        matches!(
            self,
            UserComparator::AfterDateTime | UserComparator::BeforeDateTime
        )
    }

    pub(crate) fn is_starts_with(&self) -> bool {
        use UserComparator::*;
        matches!(
            self,
            StartsWithAnyOf | StartsWithAnyOfHashed | NotStartsWithAnyOf | NotStartsWithAnyOfHashed
        )
    }

    /// `false` for the negated comparators (`NOT ...`, `!=`).
    pub(crate) fn is_positive(&self) -> bool {
        use UserComparator::*;
        !matches!(
            self,
            NotOneOf
                | NotContains
                | NotOneOfSemver
                | NotEqNum
                | NotOneOfHashed
                | NotEqHashed
                | NotStartsWithAnyOfHashed
                | NotEndsWithAnyOfHashed
                | ArrayNotContainsAnyOfHashed
                | NotEq
                | NotStartsWithAnyOf
                | NotEndsWithAnyOf
                | ArrayNotContainsAnyOf
        )
    }
}
