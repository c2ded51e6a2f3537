//! Authorized chat identities.

/// Chat ids allowed to issue commands and receive alerts.
///
/// Keeps configuration order for broadcasts; duplicates are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizedUsers {
    ids: Vec<i64>,
}

impl AuthorizedUsers {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        let mut unique = Vec::new();
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { ids: unique }
    }

    #[inline]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
