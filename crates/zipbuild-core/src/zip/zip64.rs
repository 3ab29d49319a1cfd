//! ZIP64 policy decisions.
//!
//! Each [`UseZip64Option`] variant decides whether an entry's local header
//! needs the extended form and whether the central directory does.

use crate::Result;
use crate::UseZip64Option;
use crate::Zip64Limit;
use crate::ZipBuildError;
use crate::zip::format::U16_MARKER;
use crate::zip::format::U32_MARKER;

/// Classic-format thresholds. A value at or above a threshold needs ZIP64.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Zip64Limits {
    pub bytes: u64,
    pub entries: u64,
}

impl Default for Zip64Limits {
    fn default() -> Self {
        Self {
            bytes: u64::from(U32_MARKER),
            entries: u64::from(U16_MARKER),
        }
    }
}

/// Upper bound of the payload an entry can produce.
///
/// Deflate output never exceeds the input by more than five bytes per
/// stored block plus a small trailer; encryption adds salt, verifier and
/// authentication code.
pub(crate) fn worst_case_payload(size: u64, deflated: bool, encrypted: bool) -> u64 {
    let mut bound = size;
    if deflated {
        bound = bound
            .saturating_add((size / 16_000 + 1).saturating_mul(5))
            .saturating_add(64);
    }
    if encrypted {
        bound = bound.saturating_add(crate::zip::crypto::AES_OVERHEAD);
    }
    bound
}

impl UseZip64Option {
    /// Decides the local header form of an entry before its payload is
    /// written.
    pub(crate) fn local_header(
        self,
        limits: Zip64Limits,
        name: &str,
        payload_bound: u64,
        header_offset: u64,
    ) -> Result<bool> {
        match self {
            Self::Always => Ok(true),
            Self::AsNecessary => {
                Ok(payload_bound >= limits.bytes || header_offset >= limits.bytes)
            }
            Self::Never => never_local(limits, name, payload_bound, header_offset),
        }
    }

    /// Checks the number of entries once another one is added.
    pub(crate) fn entry_count(self, limits: Zip64Limits, count: u64) -> Result<()> {
        match self {
            Self::Never if count >= limits.entries => Err(ZipBuildError::Zip64LimitExceeded {
                limit: Zip64Limit::EntryCount { count },
            }),
            _ => Ok(()),
        }
    }

    /// Decides the central directory form.
    ///
    /// `records_exceed` tells whether any record holds a value at or above
    /// the byte limit.
    pub(crate) fn central_directory(
        self,
        limits: Zip64Limits,
        records_exceed: bool,
        entries: u64,
        cd_offset: u64,
        cd_size: u64,
    ) -> Result<bool> {
        let entries_exceed = entries >= limits.entries;
        let directory_exceeds = cd_offset >= limits.bytes || cd_size >= limits.bytes;
        match self {
            Self::Always => Ok(true),
            Self::AsNecessary => Ok(records_exceed || entries_exceed || directory_exceeds),
            Self::Never => {
                if entries_exceed {
                    return Err(ZipBuildError::Zip64LimitExceeded {
                        limit: Zip64Limit::EntryCount { count: entries },
                    });
                }
                if directory_exceeds {
                    return Err(ZipBuildError::Zip64LimitExceeded {
                        limit: Zip64Limit::CentralDirectory {
                            value: cd_offset.max(cd_size),
                        },
                    });
                }
                if records_exceed {
                    return Err(ZipBuildError::Zip64LimitExceeded {
                        limit: Zip64Limit::CentralDirectory { value: cd_offset },
                    });
                }
                Ok(false)
            }
        }
    }
}

/// Checks a finished entry against the form its local header was written
/// in. A classic header cannot be widened after the fact under any policy.
pub(crate) fn check_finished_entry(
    limits: Zip64Limits,
    name: &str,
    local_zip64: bool,
    compressed: u64,
    uncompressed: u64,
) -> Result<()> {
    let largest = compressed.max(uncompressed);
    if !local_zip64 && largest >= limits.bytes {
        return Err(ZipBuildError::Zip64LimitExceeded {
            limit: Zip64Limit::EntrySize {
                name: name.to_string(),
                size: largest,
            },
        });
    }
    Ok(())
}

fn never_local(limits: Zip64Limits, name: &str, payload_bound: u64, header_offset: u64) -> Result<bool> {
    if header_offset >= limits.bytes {
        return Err(ZipBuildError::Zip64LimitExceeded {
            limit: Zip64Limit::EntryOffset {
                name: name.to_string(),
                offset: header_offset,
            },
        });
    }
    if payload_bound >= limits.bytes {
        return Err(ZipBuildError::Zip64LimitExceeded {
            limit: Zip64Limit::EntrySize {
                name: name.to_string(),
                size: payload_bound,
            },
        });
    }
    Ok(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SMALL: Zip64Limits = Zip64Limits {
        bytes: 1000,
        entries: 10,
    };

    #[test]
    fn test_default_limits_are_format_markers() {
        let limits = Zip64Limits::default();
        assert_eq!(limits.bytes, 0xFFFF_FFFF);
        assert_eq!(limits.entries, 0xFFFF);
    }

    #[test]
    fn test_local_header_always() {
        assert!(UseZip64Option::Always.local_header(SMALL, "a", 1, 0).unwrap());
    }

    #[test]
    fn test_local_header_as_necessary_threshold_is_inclusive() {
        let policy = UseZip64Option::AsNecessary;
        assert!(!policy.local_header(SMALL, "a", 999, 0).unwrap());
        assert!(policy.local_header(SMALL, "a", 1000, 0).unwrap());
        assert!(policy.local_header(SMALL, "a", 1, 1000).unwrap());
    }

    #[test]
    fn test_local_header_never() {
        let policy = UseZip64Option::Never;
        assert!(!policy.local_header(SMALL, "a", 999, 999).unwrap());

        let err = policy.local_header(SMALL, "big", 1000, 0).unwrap_err();
        assert_eq!(
            err.zip64_limit(),
            Some(&Zip64Limit::EntrySize {
                name: "big".into(),
                size: 1000
            })
        );

        let err = policy.local_header(SMALL, "late", 1, 5000).unwrap_err();
        assert!(matches!(
            err.zip64_limit(),
            Some(Zip64Limit::EntryOffset { offset: 5000, .. })
        ));
    }

    #[test]
    fn test_finished_entry_must_fit_its_header() {
        assert!(check_finished_entry(SMALL, "a", false, 10, 999).is_ok());
        assert!(check_finished_entry(SMALL, "a", true, 10, 5000).is_ok());
        assert!(check_finished_entry(SMALL, "a", false, 10, 1000).is_err());
    }

    #[test]
    fn test_entry_count_only_limits_never() {
        assert!(UseZip64Option::AsNecessary.entry_count(SMALL, 50).is_ok());
        assert!(UseZip64Option::Never.entry_count(SMALL, 9).is_ok());
        let err = UseZip64Option::Never.entry_count(SMALL, 10).unwrap_err();
        assert_eq!(err.zip64_limit(), Some(&Zip64Limit::EntryCount { count: 10 }));
    }

    #[test]
    fn test_central_directory_decisions() {
        assert!(UseZip64Option::Always.central_directory(SMALL, false, 1, 0, 0).unwrap());

        let policy = UseZip64Option::AsNecessary;
        assert!(!policy.central_directory(SMALL, false, 9, 10, 10).unwrap());
        assert!(policy.central_directory(SMALL, true, 1, 10, 10).unwrap());
        assert!(policy.central_directory(SMALL, false, 10, 10, 10).unwrap());
        assert!(policy.central_directory(SMALL, false, 1, 1000, 10).unwrap());
        assert!(policy.central_directory(SMALL, false, 1, 10, 1000).unwrap());

        let policy = UseZip64Option::Never;
        assert!(!policy.central_directory(SMALL, false, 9, 10, 10).unwrap());
        assert!(matches!(
            policy.central_directory(SMALL, false, 1, 2000, 10).unwrap_err().zip64_limit(),
            Some(Zip64Limit::CentralDirectory { value: 2000 })
        ));
    }

    #[test]
    fn test_worst_case_payload() {
        assert_eq!(worst_case_payload(100, false, false), 100);
        assert_eq!(worst_case_payload(100, true, false), 100 + 5 + 64);
        assert_eq!(worst_case_payload(0, false, true), 28);
        assert_eq!(worst_case_payload(u64::MAX, true, true), u64::MAX);
    }
}
