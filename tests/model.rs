use std::sync::Arc;

use herd::interpreter::{Builder, Model, ModelDesc, StatementDesc, Value};
use herd::runtime::agent::Species;
use herd::runtime::error::BuildError;
use herd::runtime::scope::Scope;
use herd::runtime::world::{Simulation, World};
use herd::runtime::{Runtime, RuntimeConfig};

const PASTURE: &str = r#"{
    "name": "pasture",
    "world": {
        "name": "world",
        "micro_species": ["sheep", "flock"],
        "attributes": {"captured": 0}
    },
    "species": [
        {
            "name": "sheep",
            "attributes": {"wool": 0},
            "reflex": [
                {"kind": "set", "name": "wool", "value": {"binary": {"op": "add", "left": {"var": {"name": "wool"}}, "right": {"int": 1}}}}
            ]
        },
        {
            "name": "flock",
            "micro_species": ["sheep"]
        }
    ],
    "init": [
        {"kind": "create", "species": {"species": "sheep"}, "number": {"int": 5}, "returns": "herd"},
        {"kind": "create", "species": {"species": "flock"}, "number": {"int": 1}, "body": [
            {"kind": "capture", "target": {"var": {"name": "herd"}}, "returns": "mine"},
            {"kind": "set", "target": "myself", "name": "captured",
             "value": {"call": {"function": "length", "args": [{"var": {"name": "mine"}}]}}}
        ]}
    ]
}"#;

fn scope() -> Scope {
    let world = Arc::new(World::new(Species::new("world")));
    let runtime = Runtime::new(RuntimeConfig::default(), world.clone()).unwrap();
    runtime.scope_for(world.root(), "model")
}

fn run(json: &str, scope: &mut Scope) -> Value {
    let descs: Vec<StatementDesc> = serde_json::from_str(json).unwrap();
    Builder::new()
        .sequence(&descs)
        .unwrap()
        .execute(scope)
        .unwrap()
}

fn ints(value: &Value) -> Vec<i64> {
    value
        .elements()
        .iter()
        .map(|item| item.as_int().unwrap())
        .collect()
}

#[test]
fn pasture_model_runs() {
    let desc = ModelDesc::from_json(PASTURE).unwrap();
    let model = Model::build(&desc).unwrap();
    let runtime = Runtime::new(RuntimeConfig::default(), model.world().clone()).unwrap();

    assert!(model.initialize(&runtime).is_completed());
    let root = model.world().root();
    assert_eq!(root.attribute("captured"), Some(Value::Int(5)));
    assert!(model.world().members(&root, "sheep").is_empty());
    assert_eq!(model.world().agents_of("sheep").len(), 5);

    model.step(&runtime);
    model.step(&runtime);
    assert!(
        model
            .world()
            .agents_of("sheep")
            .iter()
            .all(|sheep| sheep.attribute("wool") == Some(Value::Int(2)))
    );

    let snapshot = model.snapshot();
    assert_eq!(snapshot["model"], "pasture");
    assert_eq!(snapshot["agents"].as_array().unwrap().len(), 7);
}

#[test]
fn put_semantics() {
    let mut scope = scope();
    run(
        r#"[
            {"kind": "let", "name": "l", "value": {"list": {"items": [{"int": 1}, {"int": 2}, {"int": 3}]}}},
            {"kind": "put", "container": {"var": {"name": "l"}}, "item": {"int": 9}, "index": {"int": 1}}
        ]"#,
        &mut scope,
    );
    assert_eq!(ints(&scope.get_var("l").unwrap()), vec![1, 9, 3]);

    run(
        r#"[{"kind": "put", "container": {"var": {"name": "l"}}, "item": {"int": 0}, "all": true}]"#,
        &mut scope,
    );
    assert_eq!(ints(&scope.get_var("l").unwrap()), vec![0, 0, 0]);

    run(
        r#"[
            {"kind": "let", "name": "m", "value": {"map": {"entries": [[{"str": "a"}, {"int": 1}]]}}},
            {"kind": "put", "container": {"var": {"name": "m"}}, "item": {"int": 2}, "index": {"str": "b"}},
            {"kind": "put", "container": {"var": {"name": "m"}}, "item": {"int": 3}, "index": {"str": "a"}}
        ]"#,
        &mut scope,
    );
    assert_eq!(scope.get_var("m").unwrap().to_string(), "[a::3,b::2]");
}

#[test]
fn add_and_remove() {
    let mut scope = scope();
    run(
        r#"[
            {"kind": "let", "name": "l", "value": {"list": {"items": [{"int": 1}, {"int": 2}, {"int": 1}]}}},
            {"kind": "add", "container": {"var": {"name": "l"}}, "item": {"int": 7}, "index": {"int": 0}},
            {"kind": "add", "container": {"var": {"name": "l"}}, "item": {"int": 8}},
            {"kind": "remove", "container": {"var": {"name": "l"}}, "item": {"int": 1}, "all": true}
        ]"#,
        &mut scope,
    );
    assert_eq!(ints(&scope.get_var("l").unwrap()), vec![7, 2, 8]);

    run(
        r#"[{"kind": "remove", "container": {"var": {"name": "l"}}, "index": {"int": 0}}]"#,
        &mut scope,
    );
    assert_eq!(ints(&scope.get_var("l").unwrap()), vec![2, 8]);
}

#[test]
fn try_without_catch_yields_nil_and_continues() {
    let mut scope = scope();
    let result = run(
        r#"[
            {"kind": "let", "name": "after", "value": {"bool": false}},
            {"kind": "try", "body": [{"kind": "error", "message": {"str": "x"}}]}
        ]"#,
        &mut scope,
    );
    assert_eq!(result, Value::Nil);

    run(
        r#"[
            {"kind": "try", "body": [{"kind": "error", "message": {"str": "x"}}],
             "catch": [{"kind": "set", "name": "after", "value": {"var": {"name": "error"}}}]}
        ]"#,
        &mut scope,
    );
    assert_eq!(scope.get_var("after"), Some(Value::from("x")));
    assert_eq!(scope.depth(), 1);
}

#[test]
fn invalid_statements_fail_to_build() {
    let cases: [(&str, &str); 3] = [
        (r#"{"kind": "put", "container": {"var": {"name": "l"}}, "item": {"int": 1}}"#, "put"),
        (r#"{"kind": "remove", "container": {"var": {"name": "l"}}}"#, "remove"),
        (r#"{"kind": "loop", "var": "i", "to": {"int": 3}}"#, "loop"),
    ];
    for (json, keyword) in cases {
        let desc: StatementDesc = serde_json::from_str(json).unwrap();
        match Builder::new().statement(&desc) {
            Err(BuildError::Incomplete { statement, .. }) => assert_eq!(statement, keyword),
            other => panic!("{} should not build: {:?}", keyword, other.map(|_| ())),
        }
    }
}

#[test]
fn unknown_parent_species_fails_to_build() {
    let mut desc = ModelDesc::from_json(PASTURE).unwrap();
    desc.species[0].parent = Some("goat".into());
    assert!(matches!(
        Model::build(&desc),
        Err(BuildError::UnknownSpecies(name)) if name == "goat"
    ));
}
