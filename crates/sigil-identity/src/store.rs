//! Identity store
//!
//! Authoritative, append-mostly records keyed by principal. Identities are
//! never deleted; `disabled` replaces erasure so that audit trails stay
//! resolvable forever. The device and role indexes are caches over the
//! record map and can always be rebuilt from it.
//!
//! Admin gating, proof checking, and session cascades live in the façade;
//! the store itself only enforces record-level invariants (device limits,
//! triple uniqueness, terminal revocation).

use crate::device::DeviceKey;
use crate::profile::SecurityProfile;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sigil_core::{
    AuthLevel, AuthorityConfig, AuthorityError, AuthorityResult, DeviceId, IdentityId, TrustLevel,
};
use sigil_crypto::KeyAlgorithm;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A granted permission: a resource, the allowed actions, and an optional
/// constraint string interpreted by the consuming service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Resource the permission applies to
    pub resource: String,
    /// Actions allowed on the resource
    pub actions: Vec<String>,
    /// Optional constraint, opaque to the authority
    pub constraint: Option<String>,
}

/// The authoritative record of one principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Principal this record belongs to
    pub id: IdentityId,
    /// Registered device keys, in insertion order
    pub devices: IndexMap<DeviceId, DeviceKey>,
    /// Free-form roles gating admin operations
    pub roles: BTreeSet<String>,
    /// Granted permissions
    pub permissions: Vec<Permission>,
    /// Key-value metadata (linked wallets, display hints, ...)
    pub metadata: BTreeMap<String, String>,
    /// Authentication posture
    pub security: SecurityProfile,
    /// Creation timestamp
    pub created_at_ns: u64,
    /// Last mutation timestamp
    pub updated_at_ns: u64,
    /// Soft-deletion flag; a disabled identity never authenticates
    pub disabled: bool,
}

impl Identity {
    /// Look up a device by id
    pub fn device(&self, device_id: &DeviceId) -> Option<&DeviceKey> {
        self.devices.get(device_id)
    }

    /// Devices that may still authenticate
    pub fn active_devices(&self) -> impl Iterator<Item = &DeviceKey> {
        self.devices.values().filter(|d| d.is_active())
    }

    /// Whether the identity carries the given role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Owner of every identity record plus the rebuildable lookup indexes
#[derive(Debug, Default)]
pub struct IdentityStore {
    identities: BTreeMap<IdentityId, Identity>,
    device_index: HashMap<DeviceId, IdentityId>,
    role_index: HashMap<String, BTreeSet<IdentityId>>,
}

impl IdentityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register a new identity with its initial device
    pub fn create(
        &mut self,
        id: IdentityId,
        initial_device: DeviceKey,
        metadata: BTreeMap<String, String>,
        roles: BTreeSet<String>,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        if self.identities.contains_key(&id) {
            return Err(AuthorityError::AlreadyExists { id: id.to_string() });
        }

        let mut devices = IndexMap::new();
        self.device_index
            .insert(initial_device.device_id.clone(), id.clone());
        devices.insert(initial_device.device_id.clone(), initial_device);

        for role in &roles {
            self.role_index
                .entry(role.clone())
                .or_default()
                .insert(id.clone());
        }

        let identity = Identity {
            id: id.clone(),
            devices,
            roles,
            permissions: Vec::new(),
            metadata,
            security: SecurityProfile::default(),
            created_at_ns: now_ns,
            updated_at_ns: now_ns,
            disabled: false,
        };
        tracing::info!(identity = %id, "identity created");
        self.identities.insert(id, identity);
        Ok(())
    }

    /// Add a device key to an existing identity
    pub fn add_device(
        &mut self,
        id: &IdentityId,
        device: DeviceKey,
        config: &AuthorityConfig,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        let device_id = device.device_id.clone();
        let identity = self.get_enabled_mut(id)?;
        if identity.devices.len() >= config.max_devices_per_identity {
            return Err(AuthorityError::DeviceLimitExceeded {
                limit: config.max_devices_per_identity,
            });
        }
        let duplicate = identity.devices.values().any(|existing| {
            existing.device_id == device.device_id
                || existing.matches(&device.device_id, &device.public_key, device.algo)
        });
        if duplicate {
            return Err(AuthorityError::DuplicateDevice {
                device: device_id.to_string(),
            });
        }
        identity.devices.insert(device_id.clone(), device);
        identity.updated_at_ns = now_ns;

        self.device_index.insert(device_id.clone(), id.clone());
        tracing::info!(identity = %id, device = %device_id, "device added");
        Ok(())
    }

    /// Revoke a device key; terminal, the record stays for audit
    pub fn revoke_device(
        &mut self,
        id: &IdentityId,
        device_id: &DeviceId,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        let device = identity
            .devices
            .get_mut(device_id)
            .ok_or_else(|| AuthorityError::DeviceUnknown {
                device: device_id.to_string(),
            })?;
        device.trust = TrustLevel::Revoked;
        identity.updated_at_ns = now_ns;
        tracing::info!(identity = %id, device = %device_id, "device revoked");
        Ok(())
    }

    /// Replace the public key and algorithm on an existing device id
    ///
    /// The device keeps its trust standing; a revoked device cannot be
    /// rotated back into service.
    pub fn rotate_device_key(
        &mut self,
        id: &IdentityId,
        device_id: &DeviceId,
        new_public_key: Vec<u8>,
        algo: KeyAlgorithm,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        let device = identity
            .devices
            .get_mut(device_id)
            .ok_or_else(|| AuthorityError::DeviceUnknown {
                device: device_id.to_string(),
            })?;
        if device.trust == TrustLevel::Revoked {
            return Err(AuthorityError::DeviceRevoked {
                device: device_id.to_string(),
            });
        }
        device.public_key = new_public_key;
        device.algo = algo;
        identity.updated_at_ns = now_ns;
        tracing::info!(identity = %id, device = %device_id, "device key rotated");
        Ok(())
    }

    /// Grant a role
    pub fn grant_role(&mut self, id: &IdentityId, role: &str, now_ns: u64) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        identity.roles.insert(role.to_string());
        identity.updated_at_ns = now_ns;
        self.role_index
            .entry(role.to_string())
            .or_default()
            .insert(id.clone());
        tracing::info!(identity = %id, role, "role granted");
        Ok(())
    }

    /// Remove a role
    pub fn revoke_role(&mut self, id: &IdentityId, role: &str, now_ns: u64) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        if !identity.roles.remove(role) {
            return Err(AuthorityError::RoleNotFound {
                role: role.to_string(),
            });
        }
        identity.updated_at_ns = now_ns;
        if let Some(members) = self.role_index.get_mut(role) {
            members.remove(id);
            if members.is_empty() {
                self.role_index.remove(role);
            }
        }
        tracing::info!(identity = %id, role, "role revoked");
        Ok(())
    }

    /// Disable an identity; the record remains retrievable forever
    pub fn disable(&mut self, id: &IdentityId, now_ns: u64) -> AuthorityResult<()> {
        let identity = self.get_known_mut(id)?;
        identity.disabled = true;
        identity.updated_at_ns = now_ns;
        tracing::warn!(identity = %id, "identity disabled");
        Ok(())
    }

    /// Store a metadata entry
    pub fn set_metadata(
        &mut self,
        id: &IdentityId,
        key: &str,
        value: String,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        identity.metadata.insert(key.to_string(), value);
        identity.updated_at_ns = now_ns;
        Ok(())
    }

    /// Toggle MFA enrollment (admin operation at the façade)
    pub fn set_mfa(&mut self, id: &IdentityId, enabled: bool, now_ns: u64) -> AuthorityResult<()> {
        let identity = self.get_enabled_mut(id)?;
        identity.security.mfa_enabled = enabled;
        identity.updated_at_ns = now_ns;
        tracing::info!(identity = %id, enabled, "mfa toggled");
        Ok(())
    }

    /// Record a failed proof attempt; returns true when it triggered lockout
    pub fn record_failed_attempt(
        &mut self,
        id: &IdentityId,
        config: &AuthorityConfig,
        now_ns: u64,
    ) -> AuthorityResult<bool> {
        let identity = self.get_known_mut(id)?;
        let locked = identity.security.record_failure(
            now_ns,
            config.max_failed_attempts_before_lockout,
            config.lockout_duration_ns,
        );
        identity.updated_at_ns = now_ns;
        if locked {
            tracing::warn!(identity = %id, "identity locked out after repeated failures");
        }
        Ok(locked)
    }

    /// Record a successful verification from `device_id` at `level`
    pub fn record_verification_success(
        &mut self,
        id: &IdentityId,
        device_id: &DeviceId,
        level: AuthLevel,
        now_ns: u64,
    ) -> AuthorityResult<()> {
        let identity = self.get_known_mut(id)?;
        identity.security.record_success(level);
        if let Some(device) = identity.devices.get_mut(device_id) {
            device.last_used_at_ns = Some(now_ns);
        }
        identity.updated_at_ns = now_ns;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fetch an identity record
    pub fn get(&self, id: &IdentityId) -> Option<&Identity> {
        self.identities.get(id)
    }

    /// Fetch a record, failing with the standard taxonomy
    pub fn get_known(&self, id: &IdentityId) -> AuthorityResult<&Identity> {
        self.identities
            .get(id)
            .ok_or_else(|| AuthorityError::UnknownIdentity { id: id.to_string() })
    }

    /// Fetch a record that must exist and be enabled
    pub fn get_enabled(&self, id: &IdentityId) -> AuthorityResult<&Identity> {
        let identity = self.get_known(id)?;
        if identity.disabled {
            return Err(AuthorityError::IdentityDisabled { id: id.to_string() });
        }
        Ok(identity)
    }

    /// Resolve the identity owning a device id, via the cache index
    pub fn identity_by_device(&self, device_id: &DeviceId) -> Option<&IdentityId> {
        self.device_index.get(device_id)
    }

    /// Identities carrying a role, via the cache index
    pub fn identities_with_role(&self, role: &str) -> impl Iterator<Item = &IdentityId> {
        self.role_index.get(role).into_iter().flatten()
    }

    /// Whether the identity exists and carries the role
    pub fn has_role(&self, id: &IdentityId, role: &str) -> bool {
        self.get(id).is_some_and(|identity| identity.has_role(role))
    }

    /// Whether any enabled identity carries the role
    pub fn any_enabled_with_role(&self, role: &str) -> bool {
        self.identities_with_role(role)
            .any(|id| self.get(id).is_some_and(|identity| !identity.disabled))
    }

    /// Total number of identities, enabled or not
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Whether the store holds no identities
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Number of enabled identities
    pub fn enabled_count(&self) -> usize {
        self.identities.values().filter(|i| !i.disabled).count()
    }

    /// Iterate all records, for snapshotting
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.identities.values()
    }

    /// Replace the full record map, e.g. when restoring a snapshot
    pub fn restore(&mut self, identities: impl IntoIterator<Item = Identity>) {
        self.identities = identities
            .into_iter()
            .map(|identity| (identity.id.clone(), identity))
            .collect();
        self.rebuild_indexes();
    }

    /// Reconstruct both cache indexes from the record map
    pub fn rebuild_indexes(&mut self) {
        self.device_index.clear();
        self.role_index.clear();
        for identity in self.identities.values() {
            for device_id in identity.devices.keys() {
                self.device_index
                    .insert(device_id.clone(), identity.id.clone());
            }
            for role in &identity.roles {
                self.role_index
                    .entry(role.clone())
                    .or_default()
                    .insert(identity.id.clone());
            }
        }
    }

    fn get_known_mut(&mut self, id: &IdentityId) -> AuthorityResult<&mut Identity> {
        self.identities
            .get_mut(id)
            .ok_or_else(|| AuthorityError::UnknownIdentity { id: id.to_string() })
    }

    fn get_enabled_mut(&mut self, id: &IdentityId) -> AuthorityResult<&mut Identity> {
        let identity = self.get_known_mut(id)?;
        if identity.disabled {
            return Err(AuthorityError::IdentityDisabled { id: id.to_string() });
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthorityConfig {
        AuthorityConfig::default()
    }

    fn id(text: &str) -> IdentityId {
        IdentityId::from_text(text)
    }

    fn device(name: &str) -> DeviceKey {
        DeviceKey::new(
            DeviceId::new(name),
            KeyAlgorithm::Ed25519,
            name.as_bytes().to_vec(),
            100,
        )
    }

    fn store_with(name: &str) -> IdentityStore {
        let mut store = IdentityStore::new();
        store
            .create(
                id(name),
                device("d1"),
                BTreeMap::new(),
                BTreeSet::new(),
                100,
            )
            .unwrap();
        store
    }

    #[test]
    fn create_rejects_existing_principal() {
        let mut store = store_with("alice");
        let err = store
            .create(
                id("alice"),
                device("d2"),
                BTreeMap::new(),
                BTreeSet::new(),
                200,
            )
            .unwrap_err();
        assert_eq!(err.code(), "already_exists");
    }

    #[test]
    fn device_limit_is_enforced() {
        let mut store = store_with("alice");
        for n in 2..=10 {
            store
                .add_device(&id("alice"), device(&format!("d{n}")), &config(), 200)
                .unwrap();
        }
        let err = store
            .add_device(&id("alice"), device("d11"), &config(), 300)
            .unwrap_err();
        assert_eq!(err.code(), "device_limit_exceeded");
    }

    #[test]
    fn duplicate_triples_are_rejected() {
        let mut store = store_with("alice");
        let err = store
            .add_device(&id("alice"), device("d1"), &config(), 200)
            .unwrap_err();
        assert_eq!(err.code(), "duplicate_device");
    }

    #[test]
    fn revocation_is_terminal() {
        let mut store = store_with("alice");
        store
            .revoke_device(&id("alice"), &DeviceId::new("d1"), 200)
            .unwrap();
        let identity = store.get(&id("alice")).unwrap();
        assert_eq!(
            identity.device(&DeviceId::new("d1")).unwrap().trust,
            TrustLevel::Revoked
        );
        let err = store
            .rotate_device_key(
                &id("alice"),
                &DeviceId::new("d1"),
                vec![9u8; 32],
                KeyAlgorithm::Ed25519,
                300,
            )
            .unwrap_err();
        assert_eq!(err.code(), "device_revoked");
    }

    #[test]
    fn roles_update_the_index() {
        let mut store = store_with("alice");
        store.grant_role(&id("alice"), "gov.finalizer", 200).unwrap();
        assert!(store.has_role(&id("alice"), "gov.finalizer"));
        assert_eq!(
            store.identities_with_role("gov.finalizer").count(),
            1
        );

        store
            .revoke_role(&id("alice"), "gov.finalizer", 300)
            .unwrap();
        assert!(!store.has_role(&id("alice"), "gov.finalizer"));
        assert_eq!(store.identities_with_role("gov.finalizer").count(), 0);

        let err = store
            .revoke_role(&id("alice"), "gov.finalizer", 400)
            .unwrap_err();
        assert_eq!(err.code(), "role_not_found");
    }

    #[test]
    fn disabled_identities_stay_retrievable() {
        let mut store = store_with("alice");
        store.disable(&id("alice"), 200).unwrap();
        assert!(store.get(&id("alice")).unwrap().disabled);
        assert_eq!(store.get_enabled(&id("alice")).unwrap_err().code(), "identity_disabled");
        assert_eq!(store.len(), 1);
        assert_eq!(store.enabled_count(), 0);
        // Mutations through the enabled path are refused.
        let err = store
            .add_device(&id("alice"), device("d2"), &config(), 300)
            .unwrap_err();
        assert_eq!(err.code(), "identity_disabled");
    }

    #[test]
    fn indexes_rebuild_from_records() {
        let mut store = store_with("alice");
        store.grant_role(&id("alice"), "admin.security", 200).unwrap();
        store
            .add_device(&id("alice"), device("d2"), &config(), 200)
            .unwrap();

        let snapshot: Vec<Identity> = store.iter().cloned().collect();
        let mut restored = IdentityStore::new();
        restored.restore(snapshot);

        assert_eq!(
            restored.identity_by_device(&DeviceId::new("d2")),
            Some(&id("alice"))
        );
        assert!(restored.any_enabled_with_role("admin.security"));
    }
}
