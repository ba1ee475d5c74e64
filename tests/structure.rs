use yarp::decode::decode_any;
use yarp::encode::encode_record;
use yarp::{
    Config, Error, FieldDescriptor, Record, Registry, Result, Schema, Structure, Type,
    TypedValue, UnknownFieldPolicy, Value,
};

#[derive(Clone, Debug, PartialEq)]
struct User {
    id: i64,
    name: String,
    email: Option<String>,
    tags: Vec<String>,
}

impl Structure for User {
    const ID: u64 = 0x5553_4552;

    fn schema() -> Schema {
        Schema::new(Self::ID, "accounts", "User")
            .field(FieldDescriptor::primitive("id", Type::Int64, 0))
            .field(FieldDescriptor::primitive("name", Type::String, 1))
            .field(FieldDescriptor::primitive("email", Type::String, 2).optional())
            .field(FieldDescriptor::array("tags", Type::String, 3))
    }

    fn fill_record(&self, record: &mut Record) -> Result<()> {
        record.set("id", self.id)?;
        record.set("name", self.name.as_str())?;
        record.set("email", self.email.clone())?;
        record.set("tags", self.tags.clone())
    }

    fn from_record(record: &Record) -> Result<Self> {
        let tags = match record.get("tags") {
            Some(TypedValue::Array(items)) => items
                .iter()
                .map(|t| t.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| Error::BadField {
                    field: "tags".into(),
                    reason: "expected strings".into(),
                })?,
            _ => Vec::new(),
        };
        Ok(User {
            id: record.get_i64("id")?,
            name: record.get_str("name")?.to_string(),
            email: record.get("email").and_then(|v| v.as_str()).map(String::from),
            tags,
        })
    }
}

fn user() -> User {
    User {
        id: 7,
        name: "Ada".into(),
        email: None,
        tags: vec!["admin".into(), "ops".into()],
    }
}

#[test]
fn through_the_wire() {
    let mut registry = Registry::new();
    registry.register_structure::<User>().unwrap();

    let record = registry.record_of(&user()).unwrap();
    let mut buf = Vec::new();
    encode_record(&mut buf, &record, &registry).unwrap();

    let value = decode_any(&mut &buf[..]).unwrap();
    let encoded = match value {
        Value::Struct(encoded) => encoded,
        v => panic!("expected a struct, got {}", v),
    };
    assert_eq!(encoded.id, User::ID);
    // The unset optional email goes out as void.
    assert_eq!(encoded.fields[2], Value::Void);

    let back = registry.specialize(&encoded).unwrap();
    assert!(!back.has("email"));
    assert_eq!(back.to_structure::<User>().unwrap(), user());
}

#[test]
fn mixed_width_literals_survive_the_wire() {
    const MIXED: u64 = 0x4d49_5845;
    let mut registry = Registry::new();
    registry
        .register(
            Schema::new(MIXED, "test", "Mixed")
                .field(FieldDescriptor::primitive("f", Type::Float32, 0))
                .field(FieldDescriptor::primitive("u", Type::Uint64, 1))
                .field(FieldDescriptor::primitive("s", Type::String, 2))
                .field(FieldDescriptor::array("small", Type::Int8, 3)),
        )
        .unwrap();
    let record = Record::new(registry.schema(MIXED).unwrap())
        .with("f", 1.5f64)
        .unwrap()
        .with("u", 5i32)
        .unwrap()
        .with("s", 12u8)
        .unwrap()
        .with("small", vec![1u64, 2, 3])
        .unwrap();
    assert_eq!(record.get("f"), Some(&TypedValue::F32(1.5)));
    assert_eq!(record.get("u"), Some(&TypedValue::Uint(5)));

    let mut buf = Vec::new();
    encode_record(&mut buf, &record, &registry).unwrap();
    let back = match decode_any(&mut &buf[..]).unwrap() {
        Value::Struct(encoded) => registry.specialize(&encoded).unwrap(),
        v => panic!("expected a struct, got {}", v),
    };
    assert_eq!(back, record);
}

#[test]
fn unknown_fields_follow_policy() {
    let mut registry = Registry::with_config(Config {
        unknown_fields: UnknownFieldPolicy::Raise,
        ..Config::default()
    });
    registry.register_structure::<User>().unwrap();
    let schema = registry.schema(User::ID).unwrap();

    let named = vec![
        ("id".to_string(), TypedValue::from(1i64)),
        ("nickname".to_string(), TypedValue::from("x")),
    ];
    assert!(matches!(
        Record::from_named(schema.clone(), named.clone(), UnknownFieldPolicy::Raise),
        Err(Error::UnknownFieldInitialization { .. })
    ));
    let record = Record::from_named(schema, named, UnknownFieldPolicy::Ignore).unwrap();
    assert_eq!(record.get_i64("id"), Ok(1));
    assert!(!record.has("nickname"));
}

#[test]
fn wrong_structure_type() {
    let mut registry = Registry::new();
    registry.register_structure::<User>().unwrap();
    registry
        .register(Schema::new(2, "accounts", "Group").field(FieldDescriptor::primitive(
            "name",
            Type::String,
            0,
        )))
        .unwrap();
    let group = Record::new(registry.schema(2).unwrap())
        .with("name", "staff")
        .unwrap();
    assert!(group.to_structure::<User>().is_err());
}
