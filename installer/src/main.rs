use shop_installer::models::settings::InstallerSettings;
use shop_installer::RunOptions;
use std::path::PathBuf;

const USAGE: &str = "\
Usage: shop-installer [options]

  --config <path>          settings file (default: ./shop-installer.toml if present)
  --no-demodata            skip demodata.sql
  --international          import en.sql
  --serial[=<code>]        provision a serial (default: configured serial)
  --convert-utf            convert config values to UTF-8 and repair currencies
  --varnish                enable the reverse proxy
  --clear-temp             clear the template compile dir
  --print-default-config   print default settings as TOML and exit

Environment overrides use the SHOP_INSTALLER__ prefix, e.g. SHOP_INSTALLER__DATABASE__PASSWORD.";

/// Value of `--name <value>` or `--name=<value>`.
fn flag_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    args.iter().enumerate().find_map(|(i, a)| {
        if a == name {
            args.get(i + 1).cloned()
        } else {
            a.strip_prefix(&prefix).map(str::to_string)
        }
    })
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return;
    }

    if args.iter().any(|a| a == "--print-default-config") {
        match InstallerSettings::default().to_toml() {
            Ok(text) => print!("{}", text),
            Err(e) => {
                eprintln!("shop-installer: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let config_path = flag_value(&args, "--config").map(PathBuf::from);

    // --serial or --serial=<code>
    let serial = args
        .iter()
        .find(|a| a.as_str() == "--serial" || a.starts_with("--serial="))
        .map(|arg| {
            arg.split_once('=')
                .map(|(_, v)| v.to_string())
                .filter(|v| !v.trim().is_empty())
        });

    let options = RunOptions {
        demo_data: !args.iter().any(|a| a == "--no-demodata"),
        international: args.iter().any(|a| a == "--international"),
        serial,
        convert_utf: args.iter().any(|a| a == "--convert-utf"),
        varnish: args.iter().any(|a| a == "--varnish"),
        clear_temp: args.iter().any(|a| a == "--clear-temp"),
    };

    std::process::exit(shop_installer::run_cli(config_path.as_deref(), options));
}
