#[must_use]
pub fn help_text(command: Option<&str>) -> String {
    match command {
        Some("connect") | Some("login") => {
            "connect\n  Ask the wallet for access to the configured chain and bind a signing client\n  to the active account. The wallet may prompt for approval.\n  Alias: login".to_string()
        }
        Some("disconnect") | Some("logout") => {
            "disconnect\n  Drop the wallet session. Deployment state is kept.\n  Alias: logout".to_string()
        }
        Some("toggle") => {
            "toggle\n  Connect when disconnected, disconnect otherwise.".to_string()
        }
        Some("status") | Some("st") => {
            "status\n  Show the wallet, selected file and size, last code id, last contract\n  address, and the stored amount.\n  Alias: st".to_string()
        }
        Some("select") | Some("file") => {
            "select <path.wasm>\n  Choose the contract binary to upload. The file is read in the background;\n  check 'status' for its size.\n  Alias: file".to_string()
        }
        Some("upload") | Some("deploy") => {
            "upload\n  Upload the selected binary, then instantiate the new code id with an\n  empty init message. If instantiation fails the code id is kept;\n  retry with 'init <code_id>'.\n  Alias: deploy".to_string()
        }
        Some("init") | Some("instantiate") => {
            "init <code_id>\n  Instantiate an already uploaded code id with an empty init message.\n  Example: init 1\n  Alias: instantiate".to_string()
        }
        Some("amount") | Some("amt") => {
            "amount <n>\n  Set the amount, in base units, used by 'send juno' and 'send usdc'.\n  0 clears it.\n  Example: amount 1000000\n  Alias: amt".to_string()
        }
        Some("send") => {
            "send <juno|usdc|denom> [amount] [route|route_with_sender]\n  Execute the last instantiated contract with funds attached.\n  juno: ujuno via 'route'. usdc: Noble USDC via 'route_with_sender'.\n  Without an amount the stored one is used. A custom denom needs an amount\n  and defaults to 'route'.\n  Examples: send juno\n           send usdc 2500000\n           send ujunox 100 route_with_sender".to_string()
        }
        Some("exit") | Some("quit") | Some("q") => {
            "exit\n  Leave the REPL. All state is discarded.\n  Aliases: quit, q".to_string()
        }
        Some(other) => format!("Unknown command: '{other}'. Type 'help' for a list."),
        None => {
            "Available commands:\n\
             \n\
             \x20 connect          Connect the browser wallet\n\
             \x20 disconnect       Drop the wallet session\n\
             \x20 toggle           Connect or disconnect\n\
             \x20 status           Show current state\n\
             \x20 select           Choose a .wasm file\n\
             \x20 upload           Upload and instantiate the selected file\n\
             \x20 init             Instantiate an existing code id\n\
             \x20 amount           Set the amount for preset sends\n\
             \x20 send             Send funds to the contract\n\
             \x20 help [cmd]       Show help for a command\n\
             \x20 exit             Exit\n\
             \n\
             Type 'help <command>' for detailed help on a specific command."
                .to_string()
        }
    }
}
