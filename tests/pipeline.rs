use std::sync::{Arc, Mutex};

use json_oasis::{
    Data, DefinitionError, Erase, ErrorKind, Field, Model, ModelSlot, Origin, Record, RequiredFields, Schema,
    UnknownFields, ValidationError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn book() -> Model {
    Model::builder("Book")
        .field(Field::new("title", Schema::string().max_length(20)))
        .field(Field::new("pages", Schema::integer().minimum(1.0)))
        .field(Field::new("secret", Schema::password()).required(false))
        .build()
        .unwrap()
}

#[test]
fn book_validates_and_serializes_back() {
    let model = book();
    let rec = model.deserialize(&json!({"title": "Dune", "pages": 412}), Origin::Body).unwrap();
    assert_eq!(rec.get("title"), Some(&Data::Str("Dune".into())));
    assert_eq!(rec.get("secret"), Some(&Data::Absent));
    assert_eq!(model.serialize(&rec.into()).unwrap(), json!({"title": "Dune", "pages": 412}));
}

#[test]
fn book_errors_are_grouped_per_field() {
    let err = book()
        .deserialize(&json!({"title": "x".repeat(21), "pages": "many"}), Origin::Body)
        .unwrap_err();
    assert_eq!(
        err.format_errors(),
        json!([
            {"msgs": ["The length must be less than or equal to 20."], "loc": ["title"]},
            {"msgs": ["Not a valid integer."], "loc": ["pages"]},
        ])
    );
}

#[test]
fn passwords_never_leave_in_clear() {
    let model = book();
    let rec = model
        .deserialize(&json!({"title": "Dune", "pages": 1, "secret": "hunter2"}), Origin::Body)
        .unwrap();
    assert!(!format!("{:?}", rec.get("secret").unwrap()).contains("hunter2"));
    let out = model.serialize(&rec.into()).unwrap();
    assert_eq!(out["secret"], json!("********"));
}

#[test]
fn nested_errors_keep_full_depth() {
    let author = Model::builder("Author").field(Field::new("name", Schema::string().min_length(1))).build().unwrap();
    let item = Model::builder("Item").field(Field::new("author", Schema::model(&author))).build().unwrap();
    let shelf = Model::builder("Shelf").field(Field::new("items", Schema::list(Schema::model(&item)))).build().unwrap();

    let raw = json!({"items": [
        {"author": {"name": "a"}},
        {"author": {"name": "b"}},
        {"author": {"name": ""}},
    ]});
    let err = shelf.deserialize(&raw, Origin::Body).unwrap_err();
    assert_eq!(err.to_string(), "items[2].author.name: The length must be greater than or equal to 1.");
}

#[test]
fn recursive_models_resolve_through_slots() {
    let slot = ModelSlot::new("Node");
    let node = Model::builder("Node")
        .field(Field::new("value", Schema::integer()))
        .field(Field::new("next", Schema::lazy(&slot).nullable()).required(false))
        .build()
        .unwrap();
    slot.bind(&node).unwrap();

    let raw = json!({"value": 1, "next": {"value": 2, "next": {"value": "x"}}});
    let err = node.deserialize(&raw, Origin::Body).unwrap_err();
    assert_eq!(err.to_string(), "next.next.value: Not a valid integer.");
}

#[test]
fn ancestor_hooks_run_before_descendant_hooks() {
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let log = seen.clone();
    let base = Model::builder("Base")
        .field(Field::new("name", Schema::string()))
        .hook("name", move |v, _| {
            log.lock().unwrap().push("base:name".into());
            Ok(Data::Str(v.as_str().unwrap_or_default().to_uppercase()))
        })
        .build()
        .unwrap();

    let log = seen.clone();
    let child = Model::builder("Child")
        .extends(&base)
        .field(Field::new("greeting", Schema::string()))
        .hook("greeting", move |v, partial: &Record| {
            log.lock().unwrap().push("child:greeting".into());
            let name = partial.get("name").and_then(Data::as_str).unwrap_or_default().to_string();
            Ok(Data::Str(format!("{} {name}", v.as_str().unwrap_or_default())))
        })
        .build()
        .unwrap();

    let rec = child.deserialize(&json!({"name": "ada", "greeting": "hello"}), Origin::Body).unwrap();
    assert_eq!(rec.get("greeting"), Some(&Data::Str("hello ADA".into())));
    assert_eq!(*seen.lock().unwrap(), vec!["base:name", "child:greeting"]);
}

#[test]
fn hooks_are_checked_at_build_time() {
    let dup = Model::builder("M")
        .field(Field::new("a", Schema::string()))
        .hook("a", |v, _| Ok(v))
        .hook("a", |v, _| Ok(v))
        .build()
        .unwrap_err();
    assert!(matches!(dup, DefinitionError::DuplicateHook { .. }));

    let parent = Model::builder("P").field(Field::new("a", Schema::string())).hook("a", |v, _| Ok(v)).build().unwrap();
    let over = Model::builder("C").extends(&parent).hook("a", |v, _| Ok(v)).build().unwrap_err();
    assert!(matches!(over, DefinitionError::HookOverride { .. }));

    let unknown = Model::builder("M").hook("ghost", |v, _| Ok(v)).build().unwrap_err();
    assert!(matches!(unknown, DefinitionError::UnknownField { .. }));
}

#[test]
fn failing_hook_reports_under_its_field() {
    let model = Model::builder("Signup")
        .field(Field::new("age", Schema::integer()))
        .hook("age", |v, _| match v.as_i64() {
            Some(n) if n >= 18 => Ok(v),
            _ => Err(ValidationError::msg("Must be an adult.")),
        })
        .build()
        .unwrap();
    let err = model.deserialize(&json!({"age": 12}), Origin::Body).unwrap_err();
    assert_eq!(err.format_errors(), json!([{"msgs": ["Must be an adult."], "loc": ["age"]}]));
}

#[test]
fn post_transforms_chain_ancestors_first() {
    let base = Model::builder("Base")
        .field(Field::new("n", Schema::integer()))
        .post_transform(|mut rec| {
            let n = rec.get("n").and_then(Data::as_i64).unwrap_or(0);
            rec.insert("n", n + 1);
            Ok(rec)
        })
        .build()
        .unwrap();
    let child = Model::builder("Child")
        .extends(&base)
        .post_transform(|mut rec| {
            let n = rec.get("n").and_then(Data::as_i64).unwrap_or(0);
            rec.insert("n", n * 10);
            Ok(rec)
        })
        .build()
        .unwrap();
    let rec = child.deserialize(&json!({"n": 1}), Origin::Body).unwrap();
    assert_eq!(rec.get("n"), Some(&Data::Int(20)));
}

#[test]
fn unknown_field_policies() {
    let build = |policy: UnknownFields| {
        Model::builder("Tag")
            .field(Field::new("label", Schema::string()))
            .unknown_fields(policy)
            .build()
            .unwrap()
    };
    let raw = json!({"label": "x", "colour": "red"});

    let rec = build(UnknownFields::Exclude).deserialize(&raw, Origin::Body).unwrap();
    assert!(!rec.contains("colour"));

    let rec = build(UnknownFields::Include).deserialize(&raw, Origin::Body).unwrap();
    assert_eq!(rec.get("colour"), Some(&Data::Any(json!("red"))));

    let err = build(UnknownFields::Error).deserialize(&raw, Origin::Body).unwrap_err();
    assert_eq!(err.to_string(), "colour: Unknown field.");
}

#[test]
fn clear_sentinel_and_erase() {
    let model = Model::builder("Profile")
        .field(Field::new("bio", Schema::string()).required(false).clear_value("-"))
        .field(Field::new("nick", Schema::string()).required(false))
        .field(Field::new("motto", Schema::string()).required(false).erase(Erase::Never))
        .build()
        .unwrap();

    let rec = model.deserialize(&json!({"bio": "-", "nick": "   ", "motto": ""}), Origin::Body).unwrap();
    assert_eq!(rec.get("bio"), Some(&Data::Cleared));
    assert_eq!(rec.get("nick"), Some(&Data::Absent));
    assert_eq!(rec.get("motto"), Some(&Data::Str(String::new())));

    let out = model.serialize(&rec.into()).unwrap();
    assert_eq!(out, json!({"bio": "-", "motto": ""}));
}

#[test]
fn aliases_and_read_write_only() {
    let model = Model::builder("Account")
        .field(Field::new("id", Schema::integer()).read_only())
        .field(Field::new("display_name", Schema::string()).alias("displayName"))
        .field(Field::new("password", Schema::password()).write_only())
        .build()
        .unwrap();

    // read_only input is ignored
    let rec = model
        .deserialize(&json!({"id": 7, "displayName": "Ada", "password": "pw"}), Origin::Body)
        .unwrap();
    assert!(!rec.contains("id"));
    assert_eq!(rec.get("display_name"), Some(&Data::Str("Ada".into())));

    let mut stored = rec.clone();
    stored.insert("id", 7);
    assert_eq!(model.serialize(&stored.into()).unwrap(), json!({"id": 7, "displayName": "Ada"}));
}

#[test]
fn use_site_required_fields() {
    let patch = Model::builder("Patch")
        .field(Field::new("a", Schema::string()))
        .field(Field::new("b", Schema::string()))
        .build()
        .unwrap();
    let loose = Schema::model(&patch).required_fields(RequiredFields::only(["b"]));
    let err = loose.deserialize(&json!({}), Origin::Body).unwrap_err();
    assert_eq!(err.to_string(), "b: This field is required.");
}

#[test]
fn error_message_overrides() {
    let model = Model::builder("Form")
        .field(Field::new("email", Schema::string()).error_message(ErrorKind::Required, "Email please."))
        .build()
        .unwrap();
    let err = model.deserialize(&json!({}), Origin::Body).unwrap_err();
    assert_eq!(err.to_string(), "email: Email please.");
}

#[test]
fn text_origin_coerces_scalars() {
    let model = Model::builder("Query")
        .field(Field::new("page", Schema::integer()))
        .field(Field::new("desc", Schema::boolean()))
        .build()
        .unwrap();
    let rec = model.deserialize(&json!({"page": "3", "desc": "false"}), Origin::Text).unwrap();
    assert_eq!(rec.get("page"), Some(&Data::Int(3)));
    assert_eq!(rec.get("desc"), Some(&Data::Bool(false)));
    assert!(model.deserialize(&json!({"page": 3, "desc": "false"}), Origin::Body).is_err());
}

#[test]
fn integers_beyond_i64_are_type_errors() {
    let count = Schema::integer();
    for origin in [Origin::Body, Origin::Text] {
        let raw = match origin {
            Origin::Body => json!(9223372036854775808u64),
            Origin::Text => json!("9223372036854775808"),
        };
        let err = count.deserialize(&raw, origin).unwrap_err();
        assert_eq!(err.to_string(), "Not a valid integer.");
    }
}
