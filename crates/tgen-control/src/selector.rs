//! Port selection for fan-out operations.

use tgen_core::{CoreError, PortId};

/// Which ports a fan-out operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PortSelector {
    /// Every port, in id order.
    #[default]
    All,
    /// One port.
    One(PortId),
    /// The listed ports, in the listed order.
    Many(Vec<PortId>),
}

impl PortSelector {
    /// Expand into concrete port ids, validated against `port_count`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::PortOutOfRange` for the first id outside
    /// `0..port_count`. Nothing is expanded in that case.
    pub fn resolve(&self, port_count: usize) -> Result<Vec<PortId>, CoreError> {
        let ids = match self {
            Self::All => {
                return Ok((0..port_count)
                    .map_while(|i| PortId::try_from(i).ok())
                    .collect())
            }
            Self::One(id) => vec![*id],
            Self::Many(ids) => ids.clone(),
        };

        if let Some(&port_id) = ids.iter().find(|id| !id.is_within(port_count)) {
            return Err(CoreError::PortOutOfRange {
                port_id,
                port_count,
            });
        }
        Ok(ids)
    }
}

impl From<PortId> for PortSelector {
    fn from(id: PortId) -> Self {
        Self::One(id)
    }
}

impl From<u32> for PortSelector {
    fn from(id: u32) -> Self {
        Self::One(PortId::new(id))
    }
}

impl From<Vec<PortId>> for PortSelector {
    fn from(ids: Vec<PortId>) -> Self {
        Self::Many(ids)
    }
}

impl From<&[PortId]> for PortSelector {
    fn from(ids: &[PortId]) -> Self {
        Self::Many(ids.to_vec())
    }
}

impl From<Vec<u32>> for PortSelector {
    fn from(ids: Vec<u32>) -> Self {
        Self::Many(ids.into_iter().map(PortId::new).collect())
    }
}

impl<T: Into<PortSelector>> From<Option<T>> for PortSelector {
    fn from(selector: Option<T>) -> Self {
        selector.map_or(Self::All, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<PortId> {
        raw.iter().copied().map(PortId::new).collect()
    }

    #[test]
    fn all_expands_in_order() {
        assert_eq!(PortSelector::All.resolve(3).unwrap(), ids(&[0, 1, 2]));
        assert!(PortSelector::All.resolve(0).unwrap().is_empty());
    }

    #[test]
    fn single_becomes_singleton() {
        assert_eq!(PortSelector::from(2u32).resolve(3).unwrap(), ids(&[2]));
    }

    #[test]
    fn list_keeps_caller_order() {
        let selector = PortSelector::from(vec![2u32, 0]);
        assert_eq!(selector.resolve(3).unwrap(), ids(&[2, 0]));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = PortSelector::from(vec![0u32, 3]).resolve(3).unwrap_err();
        match err {
            CoreError::PortOutOfRange {
                port_id,
                port_count,
            } => {
                assert_eq!(port_id, PortId::new(3));
                assert_eq!(port_count, 3);
            }
            CoreError::UnknownState { .. } => panic!("expected PortOutOfRange"),
        }

        // the upper bound itself is out of range
        assert!(PortSelector::from(3u32).resolve(3).is_err());
    }

    #[test]
    fn none_means_all() {
        let selector = PortSelector::from(None::<Vec<u32>>);
        assert_eq!(selector, PortSelector::All);
        let selector = PortSelector::from(Some(1u32));
        assert_eq!(selector, PortSelector::One(PortId::new(1)));
    }
}
