//! End-to-end server tests
//!
//! Each test binds a server on an OS-assigned port, runs its accept loop on
//! a background thread, and talks to it over real sockets with the blocking
//! client (or a raw stream where the test needs to observe the connection
//! closing).

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;

use stackstore::{Client, Config, Server, StoreError};

/// Bind on an OS-assigned port and run the accept loop in the background
fn start_server() -> SocketAddr {
    let config = Config::builder().listen_addr("127.0.0.1:0").build();
    let mut server = Server::new(config);
    let addr = server.bind().expect("bind failed");
    thread::spawn(move || {
        let _ = server.run();
    });
    addr
}

fn connect(addr: SocketAddr) -> Client {
    Client::connect(addr).expect("connect failed")
}

// =============================================================================
// Session Lifecycle
// =============================================================================

#[test]
fn test_end_to_end_scenario() {
    let addr = start_server();

    let mut alice = connect(addr);
    alice.login("alice").unwrap();
    alice.create("Accounts").unwrap();
    alice.begin().unwrap();
    alice.push("100").unwrap();
    alice.set("Accounts", "balance").unwrap();
    alice.get("Accounts", "balance").unwrap();
    assert_eq!(alice.top().unwrap(), "100");
    alice.commit().unwrap();
    alice.bye().unwrap();

    // A fresh connection's non-transactional read sees the committed value
    let mut bob = connect(addr);
    bob.login("bob").unwrap();
    bob.get("Accounts", "balance").unwrap();
    assert_eq!(bob.top().unwrap(), "100");
    bob.bye().unwrap();
}

#[test]
fn test_first_request_must_be_login() {
    let addr = start_server();

    let stream = TcpStream::connect(addr).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"CREATE Accounts\n").unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert!(line.starts_with("ERROR "), "got {line:?}");

    // The session is over: the next read observes EOF
    line.clear();
    assert_eq!(reader.read_line(&mut line).unwrap(), 0);
}

#[test]
fn test_second_login_is_recoverable() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    assert!(matches!(client.login("alice"), Err(StoreError::Failed(_))));

    // The connection stays usable
    client.push("1").unwrap();
    assert_eq!(client.top().unwrap(), "1");
    client.bye().unwrap();
}

#[test]
fn test_bye_closes_connection() {
    let addr = start_server();

    let stream = TcpStream::connect(addr).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"LOGIN alice\n").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "OK\n");

    writer.write_all(b"BYE\n").unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "OK\n");

    line.clear();
    assert_eq!(reader.read_line(&mut line).unwrap(), 0);
}

#[test]
fn test_malformed_request_is_fatal() {
    let addr = start_server();

    let stream = TcpStream::connect(addr).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let mut reader = BufReader::new(stream);

    writer.write_all(b"LOGIN alice\n").unwrap();
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    assert_eq!(line, "OK\n");

    // Wrong argument count is a protocol error: ERROR then close
    writer.write_all(b"SET onlyonearg\n").unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    assert!(line.starts_with("ERROR "), "got {line:?}");

    line.clear();
    assert_eq!(reader.read_line(&mut line).unwrap(), 0);
}

// =============================================================================
// Tables
// =============================================================================

#[test]
fn test_duplicate_create_fails() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.create("Accounts").unwrap();
    assert!(matches!(
        client.create("Accounts"),
        Err(StoreError::Failed(_))
    ));
    client.bye().unwrap();
}

#[test]
fn test_set_then_get_returns_latest_value() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.create("Accounts").unwrap();

    client.push("100").unwrap();
    client.set("Accounts", "balance").unwrap();
    client.get("Accounts", "balance").unwrap();
    assert_eq!(client.top().unwrap(), "100");
    client.pop().unwrap();

    client.push("250").unwrap();
    client.set("Accounts", "balance").unwrap();
    client.get("Accounts", "balance").unwrap();
    assert_eq!(client.top().unwrap(), "250");

    client.bye().unwrap();
}

#[test]
fn test_missing_table_and_key_fail() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    assert!(matches!(
        client.get("Nowhere", "k"),
        Err(StoreError::Failed(_))
    ));

    client.create("Accounts").unwrap();
    assert!(matches!(
        client.get("Accounts", "missing"),
        Err(StoreError::Failed(_))
    ));
    client.bye().unwrap();
}

// =============================================================================
// Operand Stack and Arithmetic
// =============================================================================

#[test]
fn test_sub_is_left_minus_right() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.push("3").unwrap();
    client.push("4").unwrap();
    client.sub().unwrap();
    assert_eq!(client.top().unwrap(), "-1");
    client.bye().unwrap();
}

#[test]
fn test_failed_arithmetic_preserves_stack() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.push("notanumber").unwrap();
    client.push("4").unwrap();
    assert!(matches!(client.add(), Err(StoreError::Failed(_))));

    // Stack is exactly [notanumber, 4], as before the failed ADD
    assert_eq!(client.top().unwrap(), "4");
    client.pop().unwrap();
    assert_eq!(client.top().unwrap(), "notanumber");
    client.bye().unwrap();
}

#[test]
fn test_division_by_zero_is_recoverable() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.push("1").unwrap();
    client.push("0").unwrap();
    assert!(matches!(client.div(), Err(StoreError::Failed(_))));

    // Operands preserved and the connection still works
    assert_eq!(client.top().unwrap(), "0");
    client.pop().unwrap();
    client.pop().unwrap();
    client.push("2").unwrap();
    client.push("3").unwrap();
    client.add().unwrap();
    assert_eq!(client.top().unwrap(), "5");
    client.bye().unwrap();
}

#[test]
fn test_pop_and_top_on_empty_stack_fail() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    assert!(matches!(client.pop(), Err(StoreError::Failed(_))));
    assert!(matches!(client.top(), Err(StoreError::Failed(_))));
    client.bye().unwrap();
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_read_your_own_writes() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.create("Accounts").unwrap();
    client.push("old").unwrap();
    client.set("Accounts", "state").unwrap();

    client.begin().unwrap();
    client.push("new").unwrap();
    client.set("Accounts", "state").unwrap();
    client.get("Accounts", "state").unwrap();
    assert_eq!(client.top().unwrap(), "new");
    client.commit().unwrap();
    client.bye().unwrap();

    let mut reader = connect(addr);
    reader.login("bob").unwrap();
    reader.get("Accounts", "state").unwrap();
    assert_eq!(reader.top().unwrap(), "new");
    reader.bye().unwrap();
}

#[test]
fn test_transactional_writes_invisible_until_commit() {
    let addr = start_server();

    let mut writer = connect(addr);
    writer.login("alice").unwrap();
    writer.create("Accounts").unwrap();
    writer.begin().unwrap();
    writer.push("100").unwrap();
    writer.set("Accounts", "balance").unwrap();

    // Another transaction cannot even touch the table while it is held
    let mut observer = connect(addr);
    observer.login("bob").unwrap();
    observer.begin().unwrap();
    observer.push("0").unwrap();
    assert!(matches!(
        observer.set("Accounts", "balance"),
        Err(StoreError::Failed(_))
    ));

    writer.commit().unwrap();

    // After commit the write is visible to non-transactional reads
    let mut reader = connect(addr);
    reader.login("carol").unwrap();
    reader.get("Accounts", "balance").unwrap();
    assert_eq!(reader.top().unwrap(), "100");

    reader.bye().unwrap();
    writer.bye().unwrap();
}

#[test]
fn test_application_failure_aborts_transaction() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    client.create("Accounts").unwrap();

    client.begin().unwrap();
    client.push("100").unwrap();
    client.set("Accounts", "balance").unwrap();

    // SET consumed the stack value, so POP underflows; the failure aborts
    // the whole transaction
    assert!(matches!(client.pop(), Err(StoreError::Failed(_))));

    // The proposed write is gone and the table is released
    assert!(matches!(
        client.get("Accounts", "balance"),
        Err(StoreError::Failed(_))
    ));
    client.bye().unwrap();
}

#[test]
fn test_contention_failure_keeps_transaction_open() {
    let addr = start_server();

    let mut holder = connect(addr);
    holder.login("alice").unwrap();
    holder.create("Hot").unwrap();
    holder.create("Cold").unwrap();
    holder.begin().unwrap();
    holder.push("1").unwrap();
    holder.set("Hot", "k").unwrap();

    let mut contender = connect(addr);
    contender.login("bob").unwrap();
    contender.begin().unwrap();
    contender.push("2").unwrap();
    // Denied try_lock: FAILED, but bob's transaction stays open
    assert!(matches!(
        contender.set("Hot", "k"),
        Err(StoreError::Failed(_))
    ));

    // Bob's transaction can still acquire other tables and commit
    contender.set("Cold", "k").unwrap();
    contender.commit().unwrap();

    // Alice's transaction was untouched by bob's contention failure
    holder.commit().unwrap();

    let mut reader = connect(addr);
    reader.login("carol").unwrap();
    reader.get("Hot", "k").unwrap();
    assert_eq!(reader.top().unwrap(), "1");
    reader.get("Cold", "k").unwrap();
    assert_eq!(reader.top().unwrap(), "2");
    reader.bye().unwrap();

    holder.bye().unwrap();
    contender.bye().unwrap();
}

#[test]
fn test_nested_begin_and_stray_commit_fail() {
    let addr = start_server();
    let mut client = connect(addr);

    client.login("alice").unwrap();
    assert!(matches!(client.commit(), Err(StoreError::Failed(_))));

    client.create("Accounts").unwrap();
    client.begin().unwrap();
    assert!(matches!(client.begin(), Err(StoreError::Failed(_))));

    // The original transaction is still open and commits normally
    client.push("1").unwrap();
    client.set("Accounts", "k").unwrap();
    client.commit().unwrap();

    client.get("Accounts", "k").unwrap();
    assert_eq!(client.top().unwrap(), "1");
    client.bye().unwrap();
}

#[test]
fn test_disconnect_rolls_back_open_transaction() {
    let addr = start_server();

    let mut writer = connect(addr);
    writer.login("alice").unwrap();
    writer.create("Accounts").unwrap();
    writer.begin().unwrap();
    writer.push("100").unwrap();
    writer.set("Accounts", "balance").unwrap();

    // Drop the connection with the transaction still open
    drop(writer);

    // The table is released and the proposed write discarded; a blocking
    // non-transactional read completes once the handler tears down
    let mut reader = connect(addr);
    reader.login("bob").unwrap();
    assert!(matches!(
        reader.get("Accounts", "balance"),
        Err(StoreError::Failed(_))
    ));
    reader.bye().unwrap();
}
