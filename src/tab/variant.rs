use std::{fmt, str::FromStr};

use crate::ErrorDetail;

/// Which of the four figures of a tab is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Variant {
    pub subsampled: bool,
    pub with_targets: bool,
}

impl Variant {
    pub const FIGURE: Self = Self {
        subsampled: false,
        with_targets: false,
    };
    pub const FIGURE_TARGETS: Self = Self {
        subsampled: false,
        with_targets: true,
    };
    pub const SAMPLES: Self = Self {
        subsampled: true,
        with_targets: false,
    };
    pub const SAMPLES_TARGETS: Self = Self {
        subsampled: true,
        with_targets: true,
    };

    pub const ALL: [Self; 4] = [
        Self::FIGURE,
        Self::FIGURE_TARGETS,
        Self::SAMPLES,
        Self::SAMPLES_TARGETS,
    ];

    pub fn label(self) -> &'static str {
        match (self.subsampled, self.with_targets) {
            (false, false) => "figure",
            (false, true) => "figure+t",
            (true, false) => "samples",
            (true, true) => "samples+t",
        }
    }

    pub fn switch_char(self) -> Self {
        Self {
            subsampled: !self.subsampled,
            ..self
        }
    }

    pub fn switch_target(self) -> Self {
        Self {
            with_targets: !self.with_targets,
            ..self
        }
    }

    pub fn without_targets(self) -> Self {
        Self {
            with_targets: false,
            ..self
        }
    }

    pub(crate) fn slot(self) -> usize {
        usize::from(self.subsampled) * 2 + usize::from(self.with_targets)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Variant {
    type Err = ErrorDetail;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variant| variant.label() == label)
            .ok_or_else(|| ErrorDetail::InvalidState(label.to_owned()))
    }
}
