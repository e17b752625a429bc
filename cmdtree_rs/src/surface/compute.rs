use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::{INSTANCES_COMPLETER, ZONES_COMPLETER, render_table};
use crate::cache::TableOptions;
use crate::cache::cell::compile_glob;
use crate::driver::CommandContext;
use crate::error::{Error, Result};
use crate::parser::{ArgumentError, Value};
use crate::service::{INSTANCES, Instance, ZONES, self_link};
use crate::tree::{ArgSpec, Command, Group, ReleaseTrack, ValueType};

pub(super) const MACHINE_TYPES: &[&str] = &[
    "e2-micro",
    "e2-small",
    "e2-medium",
    "n1-standard-1",
    "n1-standard-2",
    "n1-highmem-2",
];

fn zone_flag() -> ArgSpec {
    ArgSpec::flag("zone")
        .completer(ZONES_COMPLETER)
        .help("Zone of the instance.")
}

fn uri_flag() -> ArgSpec {
    ArgSpec::flag("uri")
        .boolean()
        .help("Print a list of resource URIs instead of the default output.")
}

fn filter_flag() -> ArgSpec {
    ArgSpec::flag("filter").help("Only list resources whose name matches this glob.")
}

fn instance_arg() -> ArgSpec {
    ArgSpec::positional("NAME")
        .completer(INSTANCES_COMPLETER)
        .help("Name of the instance.")
}

pub(super) fn group() -> Group {
    let zones = Group::new("zones", "Read compute zones.").child(
        Command::new("list", "List compute zones.", zones_list)
            .arg(uri_flag())
            .arg(filter_flag()),
    );

    let instances = Group::new("instances", "Read and manipulate compute instances.")
        .child(
            Command::new("list", "List compute instances.", instances_list)
                .arg(zone_flag())
                .arg(uri_flag())
                .arg(filter_flag()),
        )
        .child(
            Command::new("describe", "Describe a compute instance.", instances_describe)
                .arg(instance_arg())
                .arg(zone_flag().required()),
        )
        .child(
            Command::new("create", "Create a compute instance.", instances_create)
                .arg(ArgSpec::positional("NAME").help("Name of the instance to create."))
                .arg(zone_flag().required())
                .arg(
                    ArgSpec::flag("machine-type")
                        .choices(MACHINE_TYPES)
                        .default_value("n1-standard-1")
                        .help("Machine type of the instance."),
                )
                .arg(
                    ArgSpec::flag("labels")
                        .value(ValueType::KeyValue)
                        .help("Labels to apply, as KEY=VALUE pairs."),
                )
                .arg(
                    ArgSpec::flag("boot-disk-size")
                        .value(ValueType::Integer)
                        .help("Boot disk size in GB."),
                )
                .arg(
                    ArgSpec::flag("max-run-duration")
                        .value(ValueType::Duration)
                        .help("Stop the instance after this long, e.g. 90m or 1h30m."),
                )
                .arg(
                    ArgSpec::flag("metadata-from-file")
                        .value(ValueType::Path)
                        .help("JSON file with string metadata entries."),
                )
                .arg(
                    ArgSpec::flag("preemptible")
                        .boolean()
                        .mutex("scheduling")
                        .help("Create a preemptible instance."),
                )
                .arg(
                    ArgSpec::flag("reservation")
                        .mutex("scheduling")
                        .help("Consume capacity from this reservation."),
                ),
        )
        .child(
            Command::new("delete", "Delete compute instances.", instances_delete)
                .arg(instance_arg().repeated())
                .arg(zone_flag().required()),
        )
        .child(
            Command::new(
                "get-serial-port-output",
                "Read output from an instance's serial port.",
                instances_serial_output,
            )
            .track(ReleaseTrack::PreRelease)
            .arg(instance_arg())
            .arg(zone_flag().required())
            .arg(
                ArgSpec::flag("port")
                    .choices(&["1", "2", "3", "4"])
                    .default_value("1")
                    .help("Serial port to read."),
            ),
        )
        .child(
            Command::new(
                "simulate-maintenance",
                "Simulate a host maintenance event on an instance.\n\
                 INSTANCE may be given as NAME:ZONE.",
                instances_simulate_maintenance,
            )
            .track(ReleaseTrack::Experimental)
            .arg(
                ArgSpec::positional("INSTANCE")
                    .completer(INSTANCES_COMPLETER)
                    .gri()
                    .help("Instance as NAME or NAME:ZONE."),
            )
            .arg(zone_flag()),
        );

    Group::new("compute", "Create and manipulate compute resources.")
        .child(zones)
        .child(instances)
}

fn name_filter(cx: &CommandContext<'_>) -> Result<Option<globset::GlobMatcher>> {
    match cx.args.str("filter") {
        None => Ok(None),
        Some(pattern) => compile_glob(pattern).map(Some).ok_or_else(|| {
            ArgumentError::invalid("--filter", pattern, format!("Invalid glob [{pattern}].")).into()
        }),
    }
}

fn zones_list(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let filter = name_filter(cx)?;
    let zones: Vec<_> = cx
        .remote(|s| s.list_zones(&project))?
        .into_iter()
        .filter(|z| filter.as_ref().is_none_or(|g| g.is_match(&z.name)))
        .collect();

    if cx.args.flag("uri") {
        for zone in &zones {
            cx.print(self_link(&project, "", ZONES, &zone.name))?;
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = zones
        .iter()
        .map(|z| vec![z.name.clone(), z.region.clone(), z.status.clone()])
        .collect();
    cx.out
        .extend_from_slice(render_table(&["NAME", "REGION", "STATUS"], &rows).as_bytes());
    Ok(())
}

fn instance_row(instance: &Instance) -> Vec<String> {
    vec![
        instance.name.clone(),
        instance.zone.clone(),
        instance.machine_type.clone(),
        instance.status.clone(),
    ]
}

const INSTANCE_HEADERS: &[&str] = &["NAME", "ZONE", "MACHINE_TYPE", "STATUS"];

fn instances_list(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let zone = cx.args.str("zone").map(str::to_string);
    let filter = name_filter(cx)?;
    let instances: Vec<Instance> = cx
        .remote(|s| s.list_instances(&project, zone.as_deref()))?
        .into_iter()
        .filter(|i| filter.as_ref().is_none_or(|g| g.is_match(&i.name)))
        .collect();

    if cx.args.flag("uri") {
        for instance in &instances {
            cx.print(self_link(&project, &instance.zone, INSTANCES, &instance.name))?;
        }
        return Ok(());
    }
    let rows: Vec<Vec<String>> = instances.iter().map(instance_row).collect();
    cx.out
        .extend_from_slice(render_table(INSTANCE_HEADERS, &rows).as_bytes());
    Ok(())
}

fn required_str(cx: &CommandContext<'_>, dest: &str, display: &str) -> Result<String> {
    cx.args.str(dest).map(str::to_string).ok_or_else(|| {
        ArgumentError::Required {
            arg: display.to_string(),
        }
        .into()
    })
}

fn instances_describe(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let name = required_str(cx, "name", "NAME")?;
    let zone = required_str(cx, "zone", "--zone")?;
    let instance = cx.remote(|s| s.get_instance(&project, &zone, &name))?;
    let json = serde_json::to_string_pretty(&instance)?;
    cx.print(json)
}

fn read_metadata(path: &Path) -> Result<BTreeMap<String, String>> {
    let display = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| {
        ArgumentError::invalid(
            "--metadata-from-file",
            &display,
            format!("Unable to read file [{display}]: {e}"),
        )
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ArgumentError::invalid(
            "--metadata-from-file",
            &display,
            format!("File [{display}] is not a JSON object of strings: {e}"),
        )
        .into()
    })
}

/// Marks cached instance listings stale after a mutation.
fn invalidate_instances(cx: &CommandContext<'_>) -> Result<()> {
    let cache = cx.cache()?;
    for name in cache.select(Some(&format!("{INSTANCES_COMPLETER}*")))? {
        cache
            .table(&name, TableOptions::new().create(false))?
            .invalidate()?;
        tracing::debug!(table = %name, "invalidated completer table");
    }
    Ok(())
}

fn instances_create(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let name = required_str(cx, "name", "NAME")?;
    let zone = required_str(cx, "zone", "--zone")?;

    let mut instance = Instance::new(&name, &zone);
    if let Some(machine_type) = cx.args.str("machine_type") {
        instance.machine_type = machine_type.to_string();
    }
    if let Some(labels) = cx.args.get("labels").and_then(Value::as_map) {
        instance.labels = labels.clone();
    }
    if let Some(size) = cx.args.get("boot_disk_size").and_then(Value::as_int) {
        if size < 10 {
            return Err(ArgumentError::invalid(
                "--boot-disk-size",
                &size.to_string(),
                "Value must be greater than or equal to 10.",
            )
            .into());
        }
        instance.boot_disk_size_gb = Some(size);
    }
    instance.max_run_duration_secs = cx.args.get("max_run_duration").and_then(Value::as_duration);
    if let Some(Value::Path(path)) = cx.args.get("metadata_from_file") {
        instance.metadata = read_metadata(path)?;
    }
    if cx.args.flag("preemptible") {
        instance.scheduling = Some("preemptible".to_string());
    } else if let Some(reservation) = cx.args.str("reservation") {
        instance.scheduling = Some(format!("reservation:{reservation}"));
    }

    let created = cx.remote(|s| s.insert_instance(&project, instance))?;
    invalidate_instances(cx)?;
    cx.status(format!(
        "Created [{}].",
        self_link(&project, &created.zone, INSTANCES, &created.name)
    ))?;
    let rows = vec![instance_row(&created)];
    cx.out
        .extend_from_slice(render_table(INSTANCE_HEADERS, &rows).as_bytes());
    Ok(())
}

fn instances_delete(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let zone = required_str(cx, "zone", "--zone")?;
    let names = cx.args.strings("name");
    if names.is_empty() {
        return Err(ArgumentError::Required {
            arg: "NAME".to_string(),
        }
        .into());
    }

    let listing: Vec<String> = names.iter().map(|n| format!(" - [{n}] in [{zone}]")).collect();
    let message = format!(
        "The following instances will be deleted:\n{}",
        listing.join("\n")
    );
    if !cx.confirm(&message, true)? {
        return Err(Error::failed(1, "Aborted by user."));
    }

    for name in &names {
        cx.remote(|s| s.delete_instance(&project, &zone, name))?;
        cx.status(format!(
            "Deleted [{}].",
            self_link(&project, &zone, INSTANCES, name)
        ))?;
    }
    invalidate_instances(cx)
}

fn instances_serial_output(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let name = required_str(cx, "name", "NAME")?;
    let zone = required_str(cx, "zone", "--zone")?;
    let port = cx.args.str("port").unwrap_or("1").to_string();
    let instance = cx.remote(|s| s.get_instance(&project, &zone, &name))?;
    cx.status(format!("Output from [{}] port {port}:", instance.name))?;
    cx.print(format!("[    0.000000] Booting {} ({})", instance.name, instance.machine_type))?;
    cx.print(format!("[    0.120000] Instance status: {}", instance.status))
}

/// Splits a `NAME:ZONE[:...]` identifier; empty fields count as absent.
pub(super) fn split_gri(value: &str) -> (String, Vec<Option<String>>) {
    let mut fields = value.split(':');
    let name = fields.next().unwrap_or_default().to_string();
    let rest = fields
        .map(|f| (!f.is_empty()).then(|| f.to_string()))
        .collect();
    (name, rest)
}

fn instances_simulate_maintenance(cx: &mut CommandContext<'_>) -> Result<()> {
    let project = cx.project();
    let raw = required_str(cx, "instance", "INSTANCE")?;
    let (name, scopes) = split_gri(&raw);
    let zone = scopes
        .into_iter()
        .next()
        .flatten()
        .or_else(|| cx.args.str("zone").map(str::to_string))
        .ok_or_else(|| ArgumentError::Required {
            arg: "--zone".to_string(),
        })?;
    let instance = cx.remote(|s| s.get_instance(&project, &zone, &name))?;
    cx.status(format!(
        "Simulated maintenance event on [{}].",
        self_link(&project, &instance.zone, INSTANCES, &instance.name)
    ))
}
