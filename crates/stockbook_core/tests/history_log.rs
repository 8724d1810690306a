use rusqlite::Connection;
use stockbook_core::db::open_db_in_memory;
use stockbook_core::{
    AdjustmentCommand, HistoryAction, HistoryService, LedgerService, Material, NewHistoryEntry,
    OrgId, SqliteHistoryRepository, SqliteMaterialRepository,
};

#[test]
fn summing_deltas_reconstructs_on_hand() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);

    ledger
        .receive(created.uuid, 5, "delivery", "m.reyes", None)
        .unwrap();
    ledger
        .issue(created.uuid, 3, "work order", "m.reyes", None)
        .unwrap();
    ledger
        .adjust(AdjustmentCommand {
            material_uuid: created.uuid,
            new_quantity: 20,
            action: HistoryAction::Adjustment,
            reason: "recount".to_string(),
            performed_by: "m.reyes".to_string(),
            notes: None,
        })
        .unwrap();
    // Over-issue clamps, and the clamped delta keeps the sum truthful.
    ledger
        .issue(created.uuid, 25, "teardown", "m.reyes", None)
        .unwrap();

    let live = ledger.get(created.uuid).unwrap().unwrap();
    let audited = history(&conn).audited_on_hand(created.uuid).unwrap();
    assert_eq!(live.on_hand, 0);
    assert_eq!(audited, live.on_hand);
}

#[test]
fn entries_are_listed_newest_first_per_material() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let first = create_material(&mut ledger, "Bearing", "BRG-1", 10);
    let second = create_material(&mut ledger, "Bolt", "BLT-1", 4);

    ledger
        .receive(first.uuid, 2, "delivery", "m.reyes", None)
        .unwrap();
    ledger
        .issue(first.uuid, 1, "work order", "m.reyes", None)
        .unwrap();

    let entries = history(&conn).list_for_material(first.uuid, None, 0).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].action, HistoryAction::Issue);
    assert_eq!(entries[1].action, HistoryAction::Receive);
    assert_eq!(entries[2].action, HistoryAction::Create);
    assert!(entries.iter().all(|entry| entry.material_uuid == first.uuid));

    let other = history(&conn)
        .list_for_material(second.uuid, None, 0)
        .unwrap();
    assert_eq!(other.len(), 1);
}

#[test]
fn list_by_action_filters_entries() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);

    ledger
        .receive(created.uuid, 2, "delivery", "m.reyes", None)
        .unwrap();
    ledger
        .receive(created.uuid, 3, "delivery", "m.reyes", None)
        .unwrap();
    ledger
        .issue(created.uuid, 1, "work order", "m.reyes", None)
        .unwrap();

    let receipts = history(&conn)
        .list_by_action(HistoryAction::Receive, None, 0)
        .unwrap();
    assert_eq!(receipts.len(), 2);
    assert!(receipts
        .iter()
        .all(|entry| entry.action == HistoryAction::Receive));

    let issues = history(&conn)
        .list_by_action(HistoryAction::Issue, None, 0)
        .unwrap();
    assert_eq!(issues.len(), 1);
}

#[test]
fn list_recent_paginates_with_limit_and_offset() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 0);

    for round in 1..=4 {
        ledger
            .receive(created.uuid, round, "delivery", "m.reyes", None)
            .unwrap();
    }

    let service = history(&conn);
    let page = service.list_recent(Some(2), 1).unwrap();
    assert_eq!(page.len(), 2);
    // 5 entries total (create + 4 receives), newest first; offset 1 skips
    // the latest receive.
    assert_eq!(page[0].quantity_change, 3);
    assert_eq!(page[1].quantity_change, 2);
}

#[test]
fn snapshots_survive_material_rename() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);

    let mut renamed = created.clone();
    renamed.name = "Bearing 6204-2RS".to_string();
    ledger.update_profile(&renamed).unwrap();
    ledger
        .receive(created.uuid, 1, "delivery", "m.reyes", None)
        .unwrap();

    let entries = history(&conn)
        .list_for_material(created.uuid, None, 0)
        .unwrap();
    // New entries snapshot the new name; old entries keep the name the
    // material had when they were written.
    assert_eq!(entries[0].material_name, "Bearing 6204-2RS");
    assert_eq!(entries[1].material_name, "Bearing");
}

#[test]
fn external_transfer_entries_append_through_the_service() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);

    let mut service = history(&conn);
    let entry = NewHistoryEntry::new(
        created.uuid,
        created.name.as_str(),
        created.sku.as_str(),
        HistoryAction::Transfer,
        10,
        10,
        "moved to plant-2",
        "m.reyes",
        Some("pallet 14".to_string()),
    );
    service.append(&entry).unwrap();

    let transfers = service
        .list_by_action(HistoryAction::Transfer, None, 0)
        .unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].quantity_change, 0);
    assert_eq!(transfers[0].notes.as_deref(), Some("pallet 14"));
}

#[test]
fn organizations_cannot_see_each_others_history() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);

    let other_repo =
        SqliteHistoryRepository::try_new(&conn, OrgId::new("org-other").unwrap()).unwrap();
    let other = HistoryService::new(other_repo);
    assert!(other
        .list_for_material(created.uuid, None, 0)
        .unwrap()
        .is_empty());
    assert_eq!(other.audited_on_hand(created.uuid).unwrap(), 0);
}

#[test]
fn history_entry_serialization_uses_expected_wire_fields() {
    let conn = open_db_in_memory().unwrap();
    let mut ledger = ledger(&conn);
    let created = create_material(&mut ledger, "Bearing", "BRG-1", 10);
    ledger
        .issue(created.uuid, 4, "work order 311", "j.ortiz", None)
        .unwrap();

    let entries = history(&conn)
        .list_for_material(created.uuid, None, 0)
        .unwrap();
    let json = serde_json::to_value(&entries[0]).unwrap();
    assert_eq!(json["material_uuid"], created.uuid.to_string());
    assert_eq!(json["action"], "issue");
    assert_eq!(json["quantity_before"], 10);
    assert_eq!(json["quantity_after"], 6);
    assert_eq!(json["quantity_change"], -4);
    assert_eq!(json["reason"], "work order 311");
    assert_eq!(json["performed_by"], "j.ortiz");
}

fn ledger(conn: &Connection) -> LedgerService<SqliteMaterialRepository<'_>> {
    let repo = SqliteMaterialRepository::try_new(conn, test_org()).unwrap();
    LedgerService::new(repo)
}

fn history(conn: &Connection) -> HistoryService<SqliteHistoryRepository<'_>> {
    let repo = SqliteHistoryRepository::try_new(conn, test_org()).unwrap();
    HistoryService::new(repo)
}

fn test_org() -> OrgId {
    OrgId::new("org-test").unwrap()
}

fn create_material(
    ledger: &mut LedgerService<SqliteMaterialRepository<'_>>,
    name: &str,
    sku: &str,
    on_hand: i64,
) -> Material {
    let mut material = Material::new(name, sku);
    material.on_hand = on_hand;
    ledger.create(material, "m.reyes").unwrap()
}
