use super::sealing_secret;
use indexmap::IndexMap;
use rand::rngs::OsRng;
use returncodes::*;
use serde::Serialize;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

pub fn command_ceremony(matches: &clap::ArgMatches, config: &Config) {
    // Unwrap is OK, this arg is required
    let out_dir = Path::new(matches.value_of("OUT-DIR").unwrap());
    let (_, ceremony) = key_ceremony(config, "ceremony");

    let mut registry = IndexMap::new();
    for component_id in &config.control_components {
        let generated = ceremony
            .generate(*component_id, &mut OsRng)
            .unwrap_or_else(|e| {
                eprintln!("returncodes ceremony: component {}: {}", component_id, e);
                std::process::exit(1);
            });

        // One file per custodian, to be handed over and stored separately
        for share in &generated.shares {
            let location = out_dir.join(share_filename(*component_id, share.index));
            write_json(&location, &KeyShareMessage::new(*component_id, share), "ceremony");
        }

        registry.insert(
            component_id.to_string(),
            HexInteger::from(&generated.public_key),
        );
    }

    let registry = serde_json::to_string_pretty(&registry).unwrap();
    println!("{}", registry);
}

pub fn command_export(matches: &clap::ArgMatches, config: &Config) {
    // Unwrap is OK, this arg is required
    let dir = Path::new(matches.value_of("SHARES-DIR").unwrap());
    let secret = sealing_secret(matches);
    let (group, ceremony) = key_ceremony(config, "export");

    let custodians: Vec<u32> = match matches.values_of("custodians") {
        Some(values) => values
            .map(|v| {
                v.parse().unwrap_or_else(|_| {
                    eprintln!("returncodes export: invalid custodian index {}", v);
                    std::process::exit(1);
                })
            })
            .collect(),
        None => (1..=config.key_sharing.threshold as u32).collect(),
    };

    for component_id in &config.control_components {
        let shares: Vec<KeyShare> = custodians
            .iter()
            .map(|index| read_share(dir, *component_id, *index, &group))
            .collect();

        let public_key = match shares.first().and_then(|s| s.public_key()) {
            Some(public_key) => *public_key,
            None => {
                eprintln!("returncodes export: component {}: no shares given", component_id);
                std::process::exit(1);
            }
        };
        let sealed = ceremony
            .export_sealed(*component_id, &public_key, &shares, &secret, &mut OsRng)
            .unwrap_or_else(|e| {
                eprintln!("returncodes export: component {}: {}", component_id, e);
                std::process::exit(1);
            });

        write_json(&dir.join(sealed_key_filename(*component_id)), &sealed, "export");
    }
}

fn key_ceremony(config: &Config, command: &str) -> (ZpSubgroup, KeyCeremony) {
    let group = config.group().unwrap_or_else(|e| {
        eprintln!("returncodes {}: invalid group parameters: {}", command, e);
        std::process::exit(1);
    });
    let ceremony = KeyCeremony::new(group.clone(), config.key_sharing).unwrap_or_else(|e| {
        eprintln!("returncodes {}: {}", command, e);
        std::process::exit(1);
    });
    (group, ceremony)
}

fn read_share(dir: &Path, component_id: ComponentId, index: u32, group: &ZpSubgroup) -> KeyShare {
    let location = dir.join(share_filename(component_id, index));
    let bytes = std::fs::read(&location).unwrap_or_else(|e| {
        eprintln!(
            "returncodes export: unable to read {}: {}",
            location.display(),
            e
        );
        std::process::exit(1);
    });
    let message = KeyShareMessage::from_bytes(&bytes).unwrap_or_else(|e| {
        eprintln!(
            "returncodes export: unable to parse {}: {}",
            location.display(),
            e
        );
        std::process::exit(1);
    });
    if message.component_id != component_id {
        eprintln!(
            "returncodes export: {} holds a share of component {}",
            location.display(),
            message.component_id
        );
        std::process::exit(1);
    }
    message.decode(group).unwrap_or_else(|e| {
        eprintln!("returncodes export: {}: {}", location.display(), e);
        std::process::exit(1);
    })
}

fn write_json<T: Serialize>(location: &Path, value: &T, command: &str) {
    let mut file = File::create(location).unwrap_or_else(|e| {
        eprintln!(
            "returncodes {}: cannot create file {}: {}",
            command,
            location.display(),
            e
        );
        std::process::exit(1);
    });
    let json = serde_json::to_string_pretty(value).unwrap();
    file.write_all(json.as_bytes()).unwrap_or_else(|e| {
        eprintln!(
            "returncodes {}: unable to write {}: {}",
            command,
            location.display(),
            e
        );
        std::process::exit(1);
    });
}

fn share_filename(component_id: ComponentId, index: u32) -> String {
    format!("component-{}.share-{}.json", component_id, index)
}

pub(crate) fn sealed_key_filename(component_id: ComponentId) -> String {
    format!("component-{}.sealed.json", component_id)
}
