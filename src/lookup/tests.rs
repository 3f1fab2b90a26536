#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

fn builtin() -> LookupTables {
    LookupTables::builtin().expect("built-in lookups parse")
}

#[test]
fn builtin_tables_load() {
    let lookups = builtin();
    let names: Vec<&str> = lookups.table_names().collect();
    for expected in [
        "orders_type",
        "orders_type_details",
        "pay_grade",
        "branch",
        "department_indicator",
        "move_status",
        "shipment_type",
    ] {
        assert!(names.contains(&expected), "missing table {expected}");
    }
}

#[test]
fn display_known_code() {
    let lookups = builtin();
    assert_eq!(
        lookups.display("orders_type", "PERMANENT_CHANGE_OF_STATION"),
        Some("Permanent Change Of Station (PCS)")
    );
    assert_eq!(lookups.display("branch", "MARINES"), Some("Marine Corps"));
}

#[test]
fn display_unknown_code_or_table() {
    let lookups = builtin();
    assert_eq!(lookups.display("orders_type", "NOPE"), None);
    assert_eq!(lookups.display("no_such_table", "ARMY"), None);
}

#[test]
fn translate_falls_back_to_code() {
    let lookups = builtin();
    assert_eq!(lookups.translate("pay_grade", "E_5"), "E-5");
    assert_eq!(lookups.translate("pay_grade", "Z_9"), "Z_9");
}

#[test]
fn field_value_uses_bound_table() {
    let lookups = builtin();
    assert_eq!(lookups.field_value("affiliation", "AIR_FORCE"), "Air Force");
    assert_eq!(lookups.field_value("sac", "23456"), "23456");
    assert_eq!(lookups.field_label("sac"), Some("HHG SAC"));
    assert_eq!(lookups.field_label("unheard_of"), None);
}

#[test]
fn rank_options_format_grade_label() {
    let lookups = builtin();
    let navy = lookups.rank_options("NAVY");
    let adm = navy.iter().find(|r| r.abbv == "ADM").expect("admiral");
    assert_eq!(adm.value, "ADM / O-10");
    assert_eq!(adm.name, "Admiral");

    let ens = navy.iter().find(|r| r.abbv == "ENS").expect("ensign");
    assert_eq!(ens.value, "ENS / O-1 or Service Academy Graduate");
}

#[test]
fn rank_options_keep_declaration_order() {
    let lookups = builtin();
    let other = lookups.rank_options("OTHER");
    assert_eq!(other.len(), 1);
    assert_eq!(other[0].value, "CIV / Civilian Employee");
    assert!(lookups.rank_options("NOT_A_BRANCH").is_empty());
}

#[test]
fn special_orders_types() {
    assert!(is_special_orders_type("BLUEBARK"));
    assert!(is_special_orders_type("WOUNDED_WARRIOR"));
    assert!(is_special_orders_type("SAFETY"));
    assert!(!is_special_orders_type("PERMANENT_CHANGE_OF_STATION"));
}

#[test]
fn from_toml_custom_document() {
    let lookups = LookupTables::from_toml(
        r#"
[tables.colour]
R = "Red"

[field_lookups]
paint = "colour"
"#,
    )
    .unwrap();
    assert_eq!(lookups.field_value("paint", "R"), "Red");
    assert_eq!(lookups.rank_options("ARMY"), Vec::new());
}
