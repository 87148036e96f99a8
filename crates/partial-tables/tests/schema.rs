use facet::Facet;
use partial_tables as partial;
use partial_tables::{
    ApplyMode, PgType, SchemaCodegen, TableDef, TableModel, collect_schema, create_table_sql,
    try_collect_schema,
};

#[derive(Facet)]
struct BusinessBase {
    #[facet(partial::pk, partial::auto)]
    id: i64,
    #[facet(partial::index)]
    business_name: String,
    #[facet(partial::allowed, partial::unique)]
    city: String,
    #[facet(partial::allowed)]
    address: String,
}

/// A published business.
#[derive(Facet)]
#[facet(partial::table = "business")]
struct Business {
    #[facet(flatten)]
    base: BusinessBase,
}

/// A business that is still being filled in.
#[derive(Facet)]
#[facet(partial::table = "business_draft", partial::variant)]
struct BusinessDraft {
    #[facet(flatten)]
    base: BusinessBase,
}

partial::register_table!(Business);
partial::register_table!(BusinessDraft);

#[derive(Facet)]
#[facet(transparent, partial::allowed)]
struct Nickname(String);

#[derive(Facet)]
#[facet(partial::variant)]
struct ProfileDraft {
    handle: String,
    nicknames: Vec<Nickname>,
}

#[test]
fn test_schema_collect() {
    let schema = collect_schema();
    assert!(schema.get_table("business").is_some());
    assert!(schema.get_table("business_draft").is_some());
}

#[test]
fn test_try_collect_schema() {
    let schema = try_collect_schema().unwrap();
    assert_eq!(schema.tables.len(), 2);
}

#[test]
fn test_base_table_keeps_every_column_required() {
    let schema = collect_schema();
    let business = schema.get_table("business").unwrap();
    assert!(!business.partial);

    let names: Vec<&str> = business.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "business_name", "city", "address"]);

    for col in &business.columns {
        assert!(!col.nullable, "{} should be NOT NULL", col.name);
    }

    let city = business.column("city").unwrap();
    assert!(city.unique);
    assert!(city.partial_allowed);
    assert_eq!(city.hint.to_string(), "String #[partial::allowed, partial::unique]");

    let id = business.column("id").unwrap();
    assert!(id.primary_key);
    assert!(id.auto_generated);
    assert_eq!(id.pg_type, PgType::BigInt);
}

#[test]
fn test_partial_variant_makes_marked_columns_nullable() {
    let schema = collect_schema();
    let draft = schema.get_table("business_draft").unwrap();
    assert!(draft.partial);

    assert!(!draft.column("id").unwrap().nullable);
    assert!(draft.column("id").unwrap().primary_key);
    assert!(!draft.column("business_name").unwrap().nullable);
    assert!(draft.column("city").unwrap().nullable);
    assert!(draft.column("address").unwrap().nullable);

    let address = draft.column("address").unwrap();
    assert_eq!(address.hint.to_string(), "Option<String> #[partial::allowed]");
    assert_eq!(address.pg_type, PgType::Text);
}

#[test]
fn test_descriptor_mode_drops_inherited_constraints() {
    let schema = collect_schema();
    let draft = schema.get_table("business_draft").unwrap();

    // The rewritten column gets a fresh descriptor.
    assert!(!draft.column("city").unwrap().unique);

    // Untouched columns keep theirs.
    assert_eq!(draft.indices.len(), 1);
    assert_eq!(draft.indices[0].name, "idx_business_draft_business_name");
}

#[test]
fn test_hints_only_mode_keeps_inherited_constraints() {
    let table = TableDef::new::<BusinessDraft>()
        .with_mode(ApplyMode::HintsOnly)
        .to_table()
        .unwrap()
        .unwrap();

    let city = table.column("city").unwrap();
    assert!(city.nullable);
    assert!(city.unique);
    assert_eq!(
        city.hint.to_string(),
        "Option<String> #[partial::allowed, partial::unique]"
    );

    assert!(table.column("address").unwrap().nullable);
    assert!(!table.column("business_name").unwrap().nullable);
}

#[test]
fn test_both_modes_agree_on_nullability() {
    let descriptors = TableDef::new::<BusinessDraft>().to_table().unwrap().unwrap();
    let hints_only = TableDef::new::<BusinessDraft>()
        .with_mode(ApplyMode::HintsOnly)
        .to_table()
        .unwrap()
        .unwrap();

    for (a, b) in descriptors.columns.iter().zip(&hints_only.columns) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.nullable, b.nullable, "nullability differs for {}", a.name);
    }
}

#[test]
fn test_application_report() {
    let (model, application) = TableDef::new::<BusinessDraft>().model().unwrap();
    assert_eq!(application.changed, vec!["city", "address"]);
    assert!(application.fallbacks.is_empty());

    assert!(model.field("city").unwrap().is_inherited());
    assert_eq!(model.field("city").unwrap().inherited_via, vec!["base"]);

    let (_, application) = TableDef::new::<Business>().model().unwrap();
    assert!(application.is_empty());
}

#[test]
fn test_marker_on_newtype_propagates_through_vec() {
    let mut model = TableModel::from_shape(ProfileDraft::SHAPE).unwrap();
    assert_eq!(
        model.hints["nicknames"].to_string(),
        "Vec<Nickname #[partial::allowed]>"
    );

    let application = model.apply_partial_fields(ApplyMode::Descriptors);
    assert_eq!(application.changed, vec!["nicknames"]);
    assert_eq!(
        model.hints["nicknames"].to_string(),
        "Vec<Option<Nickname> #[partial::allowed]>"
    );

    // The list itself stays required.
    assert!(!model.hints["nicknames"].is_optional());
    assert_eq!(model.hints["handle"].to_string(), "String");
}

#[test]
fn test_untagged_struct_is_not_a_table() {
    assert!(TableDef::new::<ProfileDraft>().to_table().unwrap().is_none());
}

#[test]
fn test_generated_sql() {
    let schema = collect_schema();

    let business = create_table_sql(schema.get_table("business").unwrap());
    assert!(business.contains("\"id\" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY"));
    assert!(business.contains("\"city\" TEXT NOT NULL UNIQUE"));
    assert!(business.contains("\"address\" TEXT NOT NULL"));

    let draft = create_table_sql(schema.get_table("business_draft").unwrap());
    assert!(draft.contains("\"business_name\" TEXT NOT NULL"));
    assert!(draft.contains("\"city\" TEXT,"));
    assert!(draft.contains("\"address\" TEXT\n"));

    let statements = schema.to_sql();
    assert_eq!(statements.len(), 4);
    assert!(
        statements
            .iter()
            .any(|s| s == "CREATE INDEX \"idx_business_business_name\" ON \"business\" (\"business_name\");")
    );
}
