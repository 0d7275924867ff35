//! Mapping between [`DaoState`] and the store's column families.
//!
//! Accounts, reputation records and proposals are one row each; the
//! remaining component fields live in small header rows. A commit writes
//! only the rows that differ from the last committed state.

use crate::config::GovernanceConfig;
use crate::engine::DaoState;
use crate::error::GovernanceError;
use crate::ledger::{Ledger, LedgerHeader};
use crate::proposal::{Proposal, ProposalRegistry};
use crate::reputation::{DecaySettings, ReputationStore};
use crate::roles::RoleRegistry;
use crate::timelock::TimelockGate;
use crate::treasury::Treasury;
use agora_storage::{Column, StateStore, WriteBatch};
use agora_types::Address;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, GovernanceError>;

const LEDGER_KEY: &[u8] = b"ledger";
const DECAY_KEY: &[u8] = b"decay";
const GOVERNANCE_KEY: &[u8] = b"governance";
const TREASURY_KEY: &[u8] = b"book";
const ROLES_KEY: &[u8] = b"roles";

#[derive(Debug, PartialEq, Serialize)]
struct GovernanceHeaderRef<'a> {
    params: &'a GovernanceConfig,
    next_id: u64,
    timelock: &'a TimelockGate,
}

#[derive(Deserialize)]
struct GovernanceHeader {
    params: GovernanceConfig,
    next_id: u64,
    timelock: TimelockGate,
}

fn governance_header(state: &DaoState) -> GovernanceHeaderRef<'_> {
    GovernanceHeaderRef {
        params: &state.params,
        next_id: state.proposals.next_id(),
        timelock: &state.timelock,
    }
}

fn put_if_changed<T: PartialEq + Serialize>(
    batch: &mut WriteBatch,
    column: Column,
    key: &[u8],
    previous: Option<T>,
    next: T,
) -> Result<()> {
    if previous.as_ref() != Some(&next) {
        batch.put(column, key, &next)?;
    }
    Ok(())
}

fn write_rows<K: Ord, V: PartialEq + Serialize>(
    batch: &mut WriteBatch,
    column: Column,
    previous: Option<&BTreeMap<K, V>>,
    next: &BTreeMap<K, V>,
    key: impl Fn(&K) -> Vec<u8>,
) -> Result<()> {
    for (k, v) in next {
        if previous.and_then(|p| p.get(k)) != Some(v) {
            batch.put(column, &key(k), v)?;
        }
    }
    if let Some(previous) = previous {
        for k in previous.keys().filter(|k| !next.contains_key(*k)) {
            batch.delete(column, &key(k))?;
        }
    }
    Ok(())
}

fn address_key(address: &Address) -> Vec<u8> {
    address.as_bytes().to_vec()
}

fn proposal_key(id: &u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Commit `next` as one batch; `previous` is the last committed state, or
/// `None` when the store is being initialized.
pub(crate) fn commit(
    store: &StateStore,
    previous: Option<&DaoState>,
    next: &DaoState,
) -> Result<u64> {
    let mut batch = store.new_batch();

    write_rows(
        &mut batch,
        Column::Accounts,
        previous.map(|p| p.ledger.account_map()),
        next.ledger.account_map(),
        address_key,
    )?;
    put_if_changed(
        &mut batch,
        Column::Metadata,
        LEDGER_KEY,
        previous.map(|p| p.ledger.header()),
        next.ledger.header(),
    )?;

    write_rows(
        &mut batch,
        Column::Reputation,
        previous.map(|p| p.reputation.records()),
        next.reputation.records(),
        address_key,
    )?;
    put_if_changed(
        &mut batch,
        Column::Metadata,
        DECAY_KEY,
        previous.map(|p| p.reputation.settings()),
        next.reputation.settings(),
    )?;

    write_rows(
        &mut batch,
        Column::Proposals,
        previous.map(|p| p.proposals.proposal_map()),
        next.proposals.proposal_map(),
        proposal_key,
    )?;
    put_if_changed(
        &mut batch,
        Column::Metadata,
        GOVERNANCE_KEY,
        previous.map(governance_header),
        governance_header(next),
    )?;

    put_if_changed(
        &mut batch,
        Column::Treasury,
        TREASURY_KEY,
        previous.map(|p| &p.treasury),
        &next.treasury,
    )?;
    put_if_changed(
        &mut batch,
        Column::Treasury,
        ROLES_KEY,
        previous.map(|p| &p.roles),
        &next.roles,
    )?;

    Ok(store.commit(batch)?)
}

fn required<T: DeserializeOwned>(store: &StateStore, column: Column, key: &[u8]) -> Result<T> {
    store.get(column, key)?.ok_or_else(|| {
        GovernanceError::Storage(format!(
            "row {:?} missing from {}",
            String::from_utf8_lossy(key),
            column.name()
        ))
    })
}

fn address_rows<V: DeserializeOwned>(
    store: &StateStore,
    column: Column,
) -> Result<BTreeMap<Address, V>> {
    store
        .scan::<V>(column)?
        .into_iter()
        .map(|(key, value)| {
            let address = Address::from_slice(&key).map_err(|e| {
                GovernanceError::Storage(format!("bad key in {}: {}", column.name(), e))
            })?;
            Ok((address, value))
        })
        .collect()
}

/// Rebuild the committed state.
pub(crate) fn load(store: &StateStore) -> Result<DaoState> {
    let ledger_header: LedgerHeader = required(store, Column::Metadata, LEDGER_KEY)?;
    let ledger = Ledger::from_parts(ledger_header, address_rows(store, Column::Accounts)?);

    let decay: DecaySettings = required(store, Column::Metadata, DECAY_KEY)?;
    let reputation = ReputationStore::from_parts(decay, address_rows(store, Column::Reputation)?);

    let governance: GovernanceHeader = required(store, Column::Metadata, GOVERNANCE_KEY)?;
    let mut proposals: BTreeMap<u64, Proposal> = BTreeMap::new();
    for (key, proposal) in store.scan::<Proposal>(Column::Proposals)? {
        let raw: [u8; 8] = key.as_slice().try_into().map_err(|_| {
            GovernanceError::Storage(format!("bad proposal key of {} bytes", key.len()))
        })?;
        proposals.insert(u64::from_be_bytes(raw), proposal);
    }

    let treasury: Treasury = required(store, Column::Treasury, TREASURY_KEY)?;
    let roles: RoleRegistry = required(store, Column::Treasury, ROLES_KEY)?;

    Ok(DaoState {
        params: governance.params,
        ledger,
        reputation,
        treasury,
        roles,
        proposals: ProposalRegistry::from_parts(governance.next_id, proposals),
        timelock: governance.timelock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::proposal::NewProposal;
    use crate::roles::Role;
    use agora_types::amount::tokens;
    use agora_types::Hash;
    use tempfile::TempDir;

    const T0: u64 = 1_700_000_000;

    fn genesis() -> DaoState {
        let mut config = EngineConfig::default();
        config.genesis.balances = vec![crate::config::Allocation {
            address: Address::from_label("alice"),
            amount: tokens(100),
        }];
        config.genesis.reputation_managers = vec![Address::from_label("manager")];
        DaoState::genesis(&config, T0).unwrap()
    }

    #[test]
    fn test_state_round_trips_through_rows() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let mut state = genesis();
        commit(&store, None, &state).unwrap();

        let previous = state.clone();
        state
            .reputation
            .add_reputation(
                &state.roles,
                &Address::from_label("manager"),
                Address::from_label("bob"),
                "ops",
                7,
                T0 + 1,
            )
            .unwrap();
        state.proposals.create(NewProposal {
            proposer: Address::from_label("alice"),
            actions: vec![],
            description_hash: Hash::compute(b"audit"),
            created_at: T0 + 1,
            snapshot_time: T0 + 2,
            deadline: T0 + 3,
            quorum_bps: 400,
        });
        assert_eq!(commit(&store, Some(&previous), &state).unwrap(), 2);

        assert_eq!(load(&store).unwrap(), state);
    }

    #[test]
    fn test_only_changed_rows_are_written() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let state = genesis();
        commit(&store, None, &state).unwrap();

        let mut next = state.clone();
        next.roles.bootstrap(Role::Governor, Address::from_label("council"));

        let mut batch = store.new_batch();
        put_if_changed(
            &mut batch,
            Column::Treasury,
            ROLES_KEY,
            Some(&state.roles),
            &next.roles,
        )
        .unwrap();
        write_rows(
            &mut batch,
            Column::Accounts,
            Some(state.ledger.account_map()),
            next.ledger.account_map(),
            address_key,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_removed_rows_are_deleted() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        let mut before = BTreeMap::new();
        before.insert(1u64, 10u64);
        before.insert(2u64, 20u64);
        let mut after = before.clone();
        after.remove(&2);

        let mut batch = store.new_batch();
        write_rows(&mut batch, Column::Proposals, None, &before, proposal_key).unwrap();
        store.commit(batch).unwrap();

        let mut batch = store.new_batch();
        write_rows(&mut batch, Column::Proposals, Some(&before), &after, proposal_key).unwrap();
        assert_eq!(batch.len(), 1);
        store.commit(batch).unwrap();
        assert_eq!(store.scan::<u64>(Column::Proposals).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_header_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path()).unwrap();
        assert!(matches!(load(&store), Err(GovernanceError::Storage(_))));
    }
}
