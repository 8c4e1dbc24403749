use crate::lead::{Lead, NewLead};
use crate::store::{LeadStore, StoreError};
use chrono::Utc;
use std::sync::{Mutex, PoisonError};

/// Process-local lead list. Records carry no id, like the browser-storage prototype.
#[derive(Debug, Default)]
pub struct MemoryStore {
    leads: Mutex<Vec<Lead>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            leads: Mutex::new(leads),
        }
    }
}

impl LeadStore for MemoryStore {
    fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut leads = self.leads.lock().unwrap_or_else(PoisonError::into_inner);

        if leads.iter().any(|existing| existing.email == lead.email) {
            return Err(StoreError::Duplicate { email: lead.email });
        }

        let stored = lead.into_lead(None, Utc::now());
        leads.push(stored.clone());

        Ok(stored)
    }

    fn list_all(&self) -> Result<Vec<Lead>, StoreError> {
        let leads = self.leads.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(leads.clone())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::lead::{NewLead, Plan, University};
    use crate::store::{LeadStore, StoreError};

    fn new_lead(email: &str) -> NewLead {
        NewLead {
            email: email.to_string(),
            name: None,
            phone: None,
            university: University::Oxford,
            selected_plan: Plan::Free,
        }
    }

    #[test]
    fn rejects_duplicate_email_without_growing() {
        let store = MemoryStore::new();
        store.insert(new_lead("a@x.com")).expect("first insert");

        let duplicate = store.insert(new_lead("a@x.com"));
        assert!(matches!(duplicate, Err(StoreError::Duplicate { .. })));
        assert_eq!(store.list_all().expect("list").len(), 1);
    }

    #[test]
    fn stored_leads_have_no_id() {
        let store = MemoryStore::new();
        let lead = store.insert(new_lead("b@x.com")).expect("insert");
        assert!(lead.id.is_none());
    }
}
