//! End-to-end shell sessions driven from scripted input

mod common;

use common::test_navigator;
use std::io::Cursor;

use vigil::shell::{repl, Dispatcher, Flow};

fn run_script(script: &str) -> String {
    let mut dispatcher = Dispatcher::new(test_navigator(), Vec::new());
    repl::run(&mut dispatcher, Cursor::new(script.to_string())).unwrap();
    String::from_utf8(dispatcher.output().clone()).unwrap()
}

#[test]
fn test_prompt_follows_context() {
    let output = run_script("cd cloud\ncd aws\nback\nback\nexit\n");
    assert!(output.contains("vigil(cloud)> "));
    assert!(output.contains("vigil(cloud.aws)> "));
    assert!(output.contains("[*] At root"));
    assert!(output.ends_with("Goodbye.\n"));
}

#[test]
fn test_end_of_input_terminates_session() {
    let output = run_script("help\n");
    assert!(output.contains("Description"));
    assert!(output.ends_with("[*] Session terminated\n"));
}

#[test]
fn test_module_workflow() {
    let output = run_script(
        "use CVE-2021-44228\nrun\nset RHOST vulnerable.local\nshow options\nexploit\nexit\n",
    );
    assert!(output.contains("[+] Loaded module: cve.2021.log4shell"));
    assert!(output.contains("required option(s) not set: RHOST"));
    assert!(output.contains("[+] RHOST => vulnerable.local"));
    assert!(output.contains("[+] cve.2021.log4shell completed successfully"));
    assert!(output.contains("\"target\": \"vulnerable.local:8080\""));
}

#[test]
fn test_secrets_are_masked() {
    let output =
        run_script("use cloud.aws.ec2\nset SECRET_KEY hunter2\nshow options\nshow global\n");
    assert!(output.contains("SECRET_KEY => *** (global, applied to active module)"));
    assert!(!output.contains("hunter2"));
}

#[test]
fn test_errors_are_reported_and_shell_continues() {
    let output = run_script("frobnicate\nset RHOST x\nuse nowhere\ncd nowhere\nsearch\nls\nexit\n");
    assert!(output.contains("[-] Unknown command: frobnicate. Type 'help' for available commands"));
    assert!(output.contains("[-] No module loaded. Use 'use <module>' first"));
    assert!(output.contains("[-] Module not registered: nowhere"));
    assert!(output.contains("[-] Invalid path: nowhere"));
    assert!(output.contains("Goodbye."));
}

#[test]
fn test_panicking_module_is_contained() {
    let output = run_script("use misc.boom\nrun\nback\nuse misc.echo\nrun\nexit\n");
    assert!(output.contains("[-] Module misc.boom failed"));
    assert!(output.contains("[*] Unloaded misc.boom"));
    assert!(output.contains("[+] misc.echo completed successfully"));
}

#[test]
fn test_search_and_info() {
    let output = run_script("search log4j\ninfo cve.2021.log4shell\nexit\n");
    assert!(output.contains("Log4Shell"));
    assert!(output.contains("CVE-2021-44228"));
}

#[test]
fn test_dispatch_exit_flow() {
    let mut dispatcher = Dispatcher::new(test_navigator(), Vec::new());
    assert_eq!(dispatcher.dispatch("   ").unwrap(), Flow::Continue);
    assert_eq!(dispatcher.dispatch("QUIT").unwrap(), Flow::Exit);
    assert_eq!(dispatcher.prompt(), "vigil> ");
}
