// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::InventoryFixture;

use ansible_keeper::{
    format::{from_ini, from_toml, to_ini, to_toml, FileFormat},
    inventory::{Dump, DumpMode, HostVars, InventoryError, Outcome, UpdateStatus},
};

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::collections::BTreeMap;

fn vars(pairs: &[(&str, &str)]) -> HostVars {
    pairs
        .iter()
        .map(|(var, value)| (var.to_string(), value.to_string()))
        .collect()
}

fn names(dump: Dump) -> Vec<String> {
    match dump {
        Dump::Hosts(names) | Dump::Groups(names) => names,
        Dump::All(_) => panic!("expected flat listing"),
    }
}

#[test]
fn add_then_show_group() -> Result<()> {
    let fixture = InventoryFixture::new("/ansible-test");
    fixture.add("db:pg01,region:eu,role:primary")?;

    let inventory = fixture.inventory();
    let shown = inventory.show_host_vars(&inventory.resolver().selector("db")?)?;
    let result = serde_json::to_value(shown)?;
    let expect = serde_json::json!({ "pg01": { "region": "eu", "role": "primary" } });
    assert_eq!(result, expect);

    let result = inventory.delete(&inventory.resolver().selector("db:pg01")?)?;
    assert!(matches!(result, Outcome::DeletedMember { group_collapsed: true, .. }));
    assert!(!names(inventory.dump(DumpMode::Groups)?).contains(&"db".to_string()));
    assert_eq!(fixture.connector().open_sessions(), 0);

    Ok(())
}

#[test]
fn read_back_yields_exactly_supplied_vars() -> Result<()> {
    let fixture = InventoryFixture::new("/ansible-test");
    fixture.add("web:www01,port:8080,dsn:http://www01:8080/health")?;

    let result = fixture.vars_of("www01")?;
    let expect = vars(&[("dsn", "http://www01:8080/health"), ("port", "8080")]);
    assert_eq!(result, expect);

    fixture.add("web:www02")?;
    assert_eq!(fixture.vars_of("www02")?, HostVars::new());

    Ok(())
}

#[test]
fn second_add_of_same_host_changes_nothing() -> Result<()> {
    let fixture = InventoryFixture::with_hosts("/ansible-test", &["db:pg01,region:eu"])?;
    let before = fixture.snapshot();

    let result = fixture.add("db:pg01,region:us");
    let error = result.expect_err("second add must be refused");
    assert!(matches!(
        error.downcast_ref::<InventoryError>(),
        Some(InventoryError::HostExists { host }) if host == "pg01"
    ));
    assert_eq!(error.to_string(), "ERROR  ==> host: pg01 exists !!!");
    assert_eq!(fixture.snapshot(), before);

    Ok(())
}

#[test]
fn delete_one_of_many_members_keeps_group() -> Result<()> {
    let fixture =
        InventoryFixture::with_hosts("/ansible-test", &["db:pg01", "db:pg02", "db:pg03"])?;
    let inventory = fixture.inventory();

    inventory.delete(&inventory.resolver().selector("db:pg02")?)?;

    let result = inventory.show_host_vars(&inventory.resolver().selector("db")?)?;
    assert_eq!(result.keys().collect::<Vec<_>>(), vec!["pg01", "pg03"]);
    assert_eq!(names(inventory.dump(DumpMode::Groups)?), vec!["db".to_string()]);
    assert_eq!(
        names(inventory.dump(DumpMode::Hosts)?),
        vec!["pg01".to_string(), "pg02".to_string(), "pg03".to_string()]
    );

    Ok(())
}

#[test]
fn update_touches_only_existing_requested_vars() -> Result<()> {
    let fixture = InventoryFixture::with_hosts(
        "/ansible-test",
        &["db:pg01,region:eu,role:primary,tier:gold"],
    )?;
    let inventory = fixture.inventory();

    let spec = inventory.resolver().host_vars("any:pg01,role:replica,zone:b")?;
    let Outcome::Updated(report) = inventory.update(&spec)? else {
        panic!("expected update outcome");
    };
    assert_eq!(report.status(), UpdateStatus::Partial);
    assert_eq!(report.skipped, vec!["zone".to_string()]);
    assert_eq!(
        fixture.vars_of("pg01")?,
        vars(&[("region", "eu"), ("role", "replica"), ("tier", "gold")])
    );

    let before = fixture.snapshot();
    let spec = inventory.resolver().host_vars("db:pg01,zone:b")?;
    let Outcome::Updated(report) = inventory.update(&spec)? else {
        panic!("expected update outcome");
    };
    assert_eq!(report.status(), UpdateStatus::NotUpdated);
    assert_eq!(fixture.snapshot(), before);

    Ok(())
}

#[test]
fn rename_host_preserves_vars() -> Result<()> {
    let fixture =
        InventoryFixture::with_hosts("/ansible-test", &["db:pg01,region:eu,role:primary"])?;
    let inventory = fixture.inventory();

    inventory.rename(&inventory.resolver().rename("hosts:pg01:pg-main")?)?;

    assert_eq!(
        fixture.vars_of("pg-main")?,
        vars(&[("region", "eu"), ("role", "primary")])
    );
    assert_eq!(names(inventory.dump(DumpMode::Hosts)?), vec!["pg-main".to_string()]);
    assert!(fixture.has_node("/ansible-test/groups/db/pg-main"));

    Ok(())
}

#[test]
fn rename_host_relinks_first_group_only() -> Result<()> {
    let fixture = InventoryFixture::with_hosts("/ansible-test", &["app:pg01"])?;
    let inventory = fixture.inventory();
    for group in ["db", "eu"] {
        inventory.add_to_group(&inventory.resolver().member(&format!("{group}:pg01"))?)?;
    }

    let result = inventory.rename(&inventory.resolver().rename("hosts:pg01:pg02")?)?;
    assert_eq!(
        result.to_string(),
        "RENAMED pg01 --> pg02 (in group app) (NOT RENAMED in groups: db, eu)"
    );
    assert!(fixture.has_node("/ansible-test/groups/app/pg02"));
    assert!(fixture.has_node("/ansible-test/groups/db/pg01"));
    assert!(fixture.has_node("/ansible-test/groups/eu/pg01"));

    Ok(())
}

#[test]
fn rename_group_keeps_members() -> Result<()> {
    let fixture = InventoryFixture::with_hosts("/ansible-test", &["db:pg01", "db:pg02"])?;
    let inventory = fixture.inventory();

    let result = inventory.rename(&inventory.resolver().rename("groups:db:postgres")?)?;
    assert_eq!(result.to_string(), "RENAMED group db --> postgres");

    let result = inventory.dump(DumpMode::All)?;
    let expect = serde_json::json!({
        "hosts": ["pg01", "pg02"],
        "groups": [{ "postgres": ["pg01", "pg02"] }]
    });
    assert_eq!(serde_json::to_value(result)?, expect);

    Ok(())
}

#[test]
fn malformed_input_never_reaches_store() -> Result<()> {
    let fixture = InventoryFixture::new("/ansible-test");
    let resolver = fixture.inventory().resolver();

    assert!(resolver.rename("hosts:pg01").is_err());
    assert!(resolver.rename("servers:pg01:pg02").is_err());
    assert!(resolver.host_vars("db:pg01,region").is_err());
    assert!(fixture.add("db").is_err());
    assert!(fixture.add("_meta:pg01,region:eu").is_err());
    assert!(fixture.inventory().import(&from_ini("[_meta]\npg01\n")?).is_err());
    assert_eq!(fixture.connector().sessions_opened(), 0);

    Ok(())
}

#[test]
fn session_released_after_store_failure() -> Result<()> {
    let fixture = InventoryFixture::with_hosts("/ansible-test", &["db:pg01,region:eu"])?;
    let inventory = fixture.inventory();

    // Open, existence checks of old and new name, then lose the connection.
    fixture.connector().disconnect_after(3);
    let result = inventory.rename(&inventory.resolver().rename("hosts:pg01:pg02")?);
    let error = result.expect_err("rename must fail");
    assert!(error.is_fatal());
    assert_eq!(fixture.connector().open_sessions(), 0);

    fixture.connector().reconnect();
    assert_eq!(fixture.vars_of("pg01")?, vars(&[("region", "eu")]));
    assert_eq!(fixture.connector().open_sessions(), 0);

    Ok(())
}

#[test]
fn flat_format_round_trip_into_empty_store() -> Result<()> {
    let source = InventoryFixture::with_hosts(
        "/ansible-test",
        &[
            "db:pg01,region:eu,role:primary,motd: hello ,dsn:pg://pg01:5432/db?x=y",
            "db:pg02,region:us",
            "web:www01",
        ],
    )?;
    source
        .inventory()
        .add_to_group(&source.inventory().resolver().member("eu:pg01")?)?;
    source.inventory().import(&from_toml(indoc! {r#"
        [_meta.hostvars.solo]
        "a:b" = "v"
        banner = "line1\nline2"
        port = 5432
    "#})?)?;
    let expect = source.inventory().automation_dump()?;
    assert_eq!(expect.meta.hostvars["pg01"]["motd"], " hello ");
    assert!(expect.groups.values().all(|entry| !entry.hosts.contains(&"solo".to_string())));

    let toml = to_toml(&expect)?;
    let target = InventoryFixture::new("/restored");
    target.inventory().import(&from_toml(&toml)?)?;
    assert_eq!(target.inventory().automation_dump()?, expect);

    let ini = to_ini(&expect)?;
    let target = InventoryFixture::new("/restored");
    target.inventory().import(&from_ini(&ini)?)?;
    assert_eq!(target.inventory().automation_dump()?, expect);

    Ok(())
}

#[sealed_test]
fn file_export_then_import() -> Result<()> {
    let source = InventoryFixture::with_hosts("/ansible-test", &["db:pg01,region:eu"])?;
    assert_eq!(source.inventory().export_file(FileFormat::Ini, "inventory.ini")?, 1);

    let target = InventoryFixture::new("/ansible-test");
    let result = target.inventory().import_file(FileFormat::Ini, "inventory.ini")?;
    assert_eq!(
        result.to_string(),
        "IMPORTED ==> groups: 1 new, hosts: 1 new, memberships: 1 new, hostvars: 1 new 0 updated"
    );
    assert_eq!(target.snapshot(), source.snapshot());

    Ok(())
}

#[test]
fn ansible_document_shape() -> Result<()> {
    let fixture = InventoryFixture::with_hosts("/ansible-test", &["db:pg01,region:eu"])?;

    let result = serde_json::to_value(fixture.inventory().automation_dump()?)?;
    let expect = serde_json::json!({
        "db": { "hosts": ["pg01"], "vars": {} },
        "_meta": { "hostvars": { "pg01": { "region": "eu" } } }
    });
    assert_eq!(result, expect);

    let result: BTreeMap<String, String> = fixture.inventory().single_host_dump("pg01")?;
    assert_eq!(result, vars(&[("region", "eu")]));

    Ok(())
}
