// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("bale")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Bale Contributors")
        .about("Installer bundle assembler")
        .subcommand_required(false)
        .subcommand(
            Command::new("build")
                .about("Bind an intermediate-representation document into a bundle executable")
                .arg(
                    Arg::new("ir")
                        .short('i')
                        .long("ir")
                        .value_name("FILE")
                        .required(true)
                        .help("Intermediate-representation document (*.bale.json)"),
                )
                .arg(
                    Arg::new("stub")
                        .short('s')
                        .long("stub")
                        .value_name("FILE")
                        .required(true)
                        .help("Platform stub executable to assemble onto"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .required(true)
                        .help("Output bundle path"),
                )
                .arg(
                    Arg::new("work_dir")
                        .long("work-dir")
                        .value_name("DIR")
                        .help("Working directory for intermediate artifacts (default: temp dir)"),
                )
                .arg(
                    Arg::new("layout")
                        .long("layout")
                        .value_name("DIR")
                        .help("Layout directory for external payloads and detached containers"),
                )
                .arg(
                    Arg::new("compression")
                        .long("compression")
                        .value_parser(["none", "low", "medium", "high"])
                        .default_value("medium")
                        .help("Container compression level"),
                )
                .arg(
                    Arg::new("bind_path")
                        .short('b')
                        .long("bind-path")
                        .value_name("DIR")
                        .action(clap::ArgAction::Append)
                        .help("Additional directory to probe for payload sources (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Read back the bundle section of an assembled bundle")
                .arg(Arg::new("bundle").required(true).help("Bundle executable path"))
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .action(clap::ArgAction::SetTrue)
                        .help("Extract and print the manifest from the UX container"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("bale.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
