//! Customer registry over the store's `apikeys` namespace.

use std::sync::{Arc, Mutex, MutexGuard};

use geolayer_core::{new_api_key, Customer, GeoError, GeoResult, API_KEY_LENGTH};

use crate::store::{Namespace, Store};

/// Reads and writes [`Customer`] records.
///
/// Read-modify-write operations (assignment, unlinking) are serialized so two
/// concurrent assignments to the same customer cannot drop one another.
pub struct CustomerRegistry {
    store: Arc<Store>,
    write_gate: Mutex<()>,
}

impl CustomerRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            write_gate: Mutex::new(()),
        }
    }

    fn gate(&self) -> GeoResult<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|_| GeoError::Internal("customer registry write gate poisoned".to_string()))
    }

    pub fn get_customer(&self, apikey: &str) -> GeoResult<Customer> {
        self.store
            .get_json(Namespace::Apikeys, apikey)?
            .ok_or_else(|| GeoError::customer_not_found(apikey))
    }

    /// Store a customer verbatim, replacing any record with the same key.
    pub fn put_customer(&self, customer: &Customer) -> GeoResult<()> {
        if customer.apikey.is_empty() {
            return Err(GeoError::BadRequest("apikey must not be empty".to_string()));
        }
        let _gate = self.gate()?;
        self.store
            .put_json(Namespace::Apikeys, &customer.apikey, customer)?;
        Ok(())
    }

    /// Mint a fresh API key and persist an empty customer for it.
    pub fn create_customer(&self) -> GeoResult<Customer> {
        let _gate = self.gate()?;
        let customer = loop {
            let apikey = new_api_key(API_KEY_LENGTH);
            if self.store.get(Namespace::Apikeys, &apikey)?.is_none() {
                break Customer::new(apikey);
            }
        };
        self.store
            .put_json(Namespace::Apikeys, &customer.apikey, &customer)?;
        tracing::info!("Customer created");
        Ok(customer)
    }

    /// Link an existing datasource to an existing customer.
    ///
    /// Assigning a datasource the customer already holds is a no-op.
    pub fn assign_datasource(&self, apikey: &str, datasource: &str) -> GeoResult<Customer> {
        let _gate = self.gate()?;
        let mut customer = self.get_customer(apikey)?;
        if self.store.get(Namespace::Layers, datasource)?.is_none() {
            return Err(GeoError::datasource_not_found(datasource));
        }

        if customer.add_datasource(datasource) {
            self.store
                .put_json(Namespace::Apikeys, &customer.apikey, &customer)?;
            tracing::info!(datasource = %datasource, "Datasource assigned to customer");
        }
        Ok(customer)
    }

    /// Remove a datasource from one customer's list. Returns whether it was
    /// listed.
    pub fn unlink_datasource(&self, apikey: &str, datasource: &str) -> GeoResult<bool> {
        let _gate = self.gate()?;
        let mut customer = self.get_customer(apikey)?;
        if !customer.remove_datasource(datasource) {
            return Ok(false);
        }
        self.store
            .put_json(Namespace::Apikeys, &customer.apikey, &customer)?;
        tracing::info!(datasource = %datasource, "Datasource unlinked from customer");
        Ok(true)
    }

    /// Remove a datasource from every customer. Returns how many customers
    /// listed it.
    pub fn unlink_everywhere(&self, datasource: &str) -> GeoResult<usize> {
        let _gate = self.gate()?;
        let mut unlinked = 0;
        for (_, mut customer) in self.store.scan_json::<Customer>(Namespace::Apikeys)? {
            if customer.remove_datasource(datasource) {
                self.store
                    .put_json(Namespace::Apikeys, &customer.apikey, &customer)?;
                unlinked += 1;
            }
        }
        Ok(unlinked)
    }

    /// Every customer in key order.
    pub fn list_customers(&self) -> GeoResult<Vec<Customer>> {
        Ok(self
            .store
            .scan_json::<Customer>(Namespace::Apikeys)?
            .into_iter()
            .map(|(_, customer)| customer)
            .collect())
    }

    /// Resolve a customer and check it owns `datasource`.
    ///
    /// Unknown key is `NotFound`; a datasource the customer does not list is
    /// `Unauthorized`.
    pub fn authorize(&self, apikey: &str, datasource: &str) -> GeoResult<Customer> {
        let customer = self.get_customer(apikey)?;
        if !customer.owns(datasource) {
            return Err(GeoError::Unauthorized(format!(
                "datasource {} is not assigned to this apikey",
                datasource
            )));
        }
        Ok(customer)
    }
}
