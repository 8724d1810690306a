use stockbook_core::{Material, MaterialStatus, MaterialValidationError};
use uuid::Uuid;

#[test]
fn material_new_sets_defaults() {
    let material = Material::new("Hydraulic Filter", "hf-220");

    assert!(!material.uuid.is_nil());
    assert_eq!(material.name, "Hydraulic Filter");
    assert_eq!(material.sku, "HF-220");
    assert_eq!(material.on_hand, 0);
    assert_eq!(material.min_level, 0);
    assert_eq!(material.status, MaterialStatus::Active);
    assert_eq!(material.last_counted_at, None);
    assert_eq!(material.last_adjusted_at, None);
    assert!(material.is_active());
}

#[test]
fn with_id_rejects_nil_uuid() {
    let err = Material::with_id(Uuid::nil(), "Filter", "HF-220").unwrap_err();
    assert_eq!(err, MaterialValidationError::NilUuid);
}

#[test]
fn validate_rejects_empty_name_and_negative_thresholds() {
    let mut material = Material::new("  ", "HF-220");
    assert_eq!(material.validate(), Err(MaterialValidationError::EmptyName));

    material.name = "Filter".to_string();
    material.min_level = -1;
    assert_eq!(
        material.validate(),
        Err(MaterialValidationError::NegativeMinLevel(-1))
    );

    material.min_level = 0;
    material.on_hand = -5;
    assert_eq!(
        material.validate(),
        Err(MaterialValidationError::NegativeInitialQuantity(-5))
    );
}

#[test]
fn material_serialization_uses_expected_wire_fields() {
    let material_id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut material = Material::with_id(material_id, "Bearing 6204", "brg-6204").unwrap();
    material.on_hand = 42;
    material.min_level = 10;
    material.department = Some("maintenance".to_string());
    material.status = MaterialStatus::Inactive;
    material.last_counted_at = Some(1_700_000_000_000);

    let json = serde_json::to_value(&material).unwrap();
    assert_eq!(json["uuid"], material_id.to_string());
    assert_eq!(json["name"], "Bearing 6204");
    assert_eq!(json["sku"], "BRG-6204");
    assert_eq!(json["on_hand"], 42);
    assert_eq!(json["min_level"], 10);
    assert_eq!(json["department"], "maintenance");
    assert_eq!(json["status"], "inactive");
    assert_eq!(json["last_counted_at"], 1_700_000_000_000_i64);

    let decoded: Material = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, material);
}
