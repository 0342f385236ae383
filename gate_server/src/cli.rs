use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // GATE_JWT_SECRET and GATE_GROOVE_SECRET are deliberately absent
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "GATE_HOST",
        "GATE_PORT",
        "GATE_DATABASE_URL",
        "GATE_IP_RATE_LIMIT",
        "GATE_IP_RATE_WINDOW_MS",
        "GATE_PARTNER_RATE_LIMIT",
        "GATE_PARTNER_RATE_WINDOW_MS",
        "GATE_SUBJECT_RATE_LIMIT",
        "GATE_SUBJECT_RATE_WINDOW_MS",
        "GATE_CACHE_TTL_SECS",
        "GATE_STORE_TIMEOUT_MS",
        "GATE_USE_X_FORWARDED_FOR",
        "GATE_USE_FORWARDED",
        "GATE_CORS_ORIGINS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
