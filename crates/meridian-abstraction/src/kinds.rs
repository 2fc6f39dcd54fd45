//! Type identifiers for pluggable components.
//!
//! Every concept family has a closed enumeration of built-in variants. User
//! code registers further variants under free-form string identifiers. Both
//! resolve through the same [`TypeKey`] namespace within a family.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Identifier used to select a component implementation at runtime.
///
/// Keys are compared by their exact string value; built-in kinds convert to
/// their canonical kebab-case name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    /// Creates a key from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for empty or whitespace-only identifiers.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Borrow<str> for TypeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TypeKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for TypeKey {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

/// Error returned when a string does not name a built-in kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown built-in {family} kind: {value}")]
pub struct UnknownKind {
    /// Family the lookup was made against.
    pub family: &'static str,
    /// The rejected value.
    pub value: String,
}

macro_rules! builtin_kinds {
    (
        $(#[$meta:meta])*
        $name:ident, $family:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $id:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $id)] $variant, )+
        }

        impl $name {
            /// Every built-in variant of this family.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical identifier of this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $id,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($id => Ok(Self::$variant),)+
                    _ => Err(UnknownKind { family: $family, value: s.to_string() }),
                }
            }
        }

        impl From<$name> for TypeKey {
            fn from(kind: $name) -> Self {
                TypeKey::new(kind.as_str())
            }
        }
    };
}

builtin_kinds! {
    /// Built-in computation layers.
    LayerKind, "layer" {
        Convolution => "convolution",
        Pooling => "pooling",
        InnerProduct => "inner-product",
        Relu => "relu",
        Sigmoid => "sigmoid",
        Tanh => "tanh",
        Dropout => "dropout",
        /// Local response normalization.
        Lrn => "lrn",
        SoftmaxLoss => "softmax-loss",
        EuclideanLoss => "euclidean-loss",
        Concate => "concate",
        Slice => "slice",
        Split => "split",
        StoreInput => "store-input",
        Label => "label",
        RbmVisible => "rbm-visible",
        RbmHidden => "rbm-hidden",
    }
}

builtin_kinds! {
    /// Built-in parameter containers.
    ParamKind, "param" {
        Dense => "param",
    }
}

builtin_kinds! {
    /// Built-in parameter initializers.
    ParamGenKind, "param-generator" {
        Constant => "constant",
        Uniform => "uniform",
        Gaussian => "gaussian",
        GaussianSqrtFanIn => "gaussian-sqrt-fan-in",
        UniformSqrtFanIn => "uniform-sqrt-fan-in",
        UniformSqrtFanInOut => "uniform-sqrt-fan-in-out",
    }
}

builtin_kinds! {
    /// Built-in learning-rate schedules.
    LrKind, "lr-generator" {
        Fixed => "fixed",
        Linear => "linear",
        Exponential => "exponential",
        InverseT => "inverse-t",
        Inverse => "inverse",
        Step => "step",
        FixedStep => "fixed-step",
    }
}

builtin_kinds! {
    /// Built-in weight updaters.
    UpdaterKind, "updater" {
        Sgd => "sgd",
        AdaGrad => "adagrad",
        Nesterov => "nesterov",
        RmsProp => "rmsprop",
    }
}

builtin_kinds! {
    /// Built-in training workers, one per train-one-batch algorithm.
    WorkerKind, "worker" {
        /// Back-propagation.
        Bp => "bp",
        /// Contrastive divergence.
        Cd => "cd",
    }
}
