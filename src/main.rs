use std::env;
use std::fs;
use std::process;

use rustigree::options::Options;
use rustigree::pedigree::{self, PedigreeContext};
use rustigree::person::Person;

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pedigree.json> [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  -o, --output <file>     Output file (default: stdout)");
        eprintln!("  -w, --width <px>        SVG width (default: 600)");
        eprintln!("  -H, --height <px>       SVG height (default: 400)");
        eprintln!("  -s, --symbol-size <px>  Symbol size (default: 35)");
        eprintln!("  -y, --year <year>       Current year for age checks");
        process::exit(1);
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut opts = Options::default();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                i += 1;
                if i < args.len() {
                    output_path = Some(args[i].clone());
                }
            }
            "-w" | "--width" => {
                i += 1;
                if i < args.len() {
                    opts.width = parse_num(&args[i]);
                }
            }
            "-H" | "--height" => {
                i += 1;
                if i < args.len() {
                    opts.height = parse_num(&args[i]);
                }
            }
            "-s" | "--symbol-size" => {
                i += 1;
                if i < args.len() {
                    opts.symbol_size = parse_num(&args[i]);
                }
            }
            "-y" | "--year" => {
                i += 1;
                if i < args.len() {
                    opts.current_year = Some(parse_num(&args[i]) as u32);
                }
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let dataset: Vec<Person> = match serde_json::from_str(&input) {
        Ok(ds) => ds,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", input_path, e);
            process::exit(1);
        }
    };
    opts.dataset = dataset;

    let mut ctx = PedigreeContext::new();
    if let Err(e) = pedigree::build(&mut ctx, opts) {
        eprintln!("Build error: {}", e);
        process::exit(1);
    }
    let svg = ctx.svg().unwrap_or_default();

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, svg) {
                eprintln!("Failed to write {}: {}", path, e);
                process::exit(1);
            }
        }
        None => print!("{}", svg),
    }
}

fn parse_num(s: &str) -> f64 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("Invalid number: {}", s);
        process::exit(1);
    })
}
