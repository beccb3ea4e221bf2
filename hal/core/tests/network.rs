use hal_core::{
    Console, MemoryMode, Network, NetworkBuilder, NetworkConfig, Port, PortRef, Processor,
    ProcessorConfig, ProcessorState, Program, SharedLines, Topology,
};
use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn program(lines: &[&str]) -> Program {
    Program::from_lines(lines.iter().copied()).unwrap()
}

fn pipeline(config: ProcessorConfig) -> NetworkBuilder {
    Network::builder(config)
        .processor(0, program(&["LOADNUM 42", "OUT 0", "STOP"]))
        .processor(1, program(&["IN 0", "STORE 0", "STOP"]))
        .connect(PortRef::new(0, 0), PortRef::new(1, 0))
}

#[test]
fn two_processor_pipeline_delivers_value() {
    let mut outcome = pipeline(ProcessorConfig::default())
        .build(Console::default())
        .unwrap()
        .run()
        .unwrap();
    assert!(outcome
        .reports
        .iter()
        .all(|r| r.state == ProcessorState::Halted && r.error.is_none()));
    let consumer = outcome.processors.iter_mut().find(|p| p.id() == 1).unwrap();
    assert_eq!(consumer.memory_mut().read(0).unwrap(), 42.0);
    assert_eq!(outcome.reports[0].id, 0);
    assert_eq!(outcome.reports[1].id, 1);
}

#[test]
fn pipeline_is_identical_on_flat_memory() {
    let config = ProcessorConfig {
        memory: MemoryMode::Flat,
        ..ProcessorConfig::default()
    };
    let outcome = pipeline(config).build(Console::default()).unwrap().run().unwrap();
    assert_eq!(outcome.processor(1).unwrap().memory().physical_words()[0], 42.0);
}

#[test]
fn values_arrive_in_send_order() {
    let out = SharedLines::new();
    let producer = program(&[
        "LOADNUM 1",
        "OUT 1",
        "LOADNUM 2",
        "OUT 1",
        "LOADNUM 3",
        "OUT 1",
        "LOADNUM -1",
        "OUT 1",
        "STOP",
    ]);
    // Forwards until it sees a negative value.
    let relay = program(&["IN 2", "JUMPNEG 4", "OUT 3", "JUMP 0", "STOP"]);
    Network::builder(ProcessorConfig::default())
        .processor(0, producer)
        .processor(1, relay)
        .connect(PortRef::new(0, 1), PortRef::new(1, 2))
        .stdout(PortRef::new(1, 3))
        .build(Console::new(std::io::empty(), out.clone()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(out.snapshot(), vec!["1", "2", "3"]);
}

#[test]
fn stdin_feeds_and_stdout_collects() {
    let out = SharedLines::new();
    let console = Console::new(Cursor::new("2.5\n4\n"), out.clone());
    let doubler = program(&["IN 0", "MULNUM 2", "OUT 1", "IN 0", "MULNUM 2", "OUT 1", "STOP"]);
    Network::builder(ProcessorConfig::default())
        .processor(5, doubler)
        .stdin(PortRef::new(5, 0))
        .stdout(PortRef::new(5, 1))
        .build(console)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(out.snapshot(), vec!["5", "8"]);
}

#[test]
fn dump_prog_lists_every_instruction() {
    let out = SharedLines::new();
    Network::builder(ProcessorConfig::default())
        .processor(0, program(&["loadnum 1", "DUMPPROG", "STOP"]))
        .stdout(PortRef::new(0, 1))
        .build(Console::new(std::io::empty(), out.clone()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(out.snapshot(), vec!["loadnum 1", "DUMPPROG", "STOP"]);
}

#[test]
fn fault_log_receives_one_line_per_fault() {
    let faults = SharedLines::new();
    let sink = faults.clone();
    let outcome = Network::builder(ProcessorConfig::default())
        .processor(0, program(&["LOADNUM 1", "STORE 10240", "STORE 20480", "STOP"]))
        .fault_log(move |_| -> Box<dyn hal_core::LineSink> { Box::new(sink.clone()) })
        .build(Console::default())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(
        faults.snapshot(),
        vec![
            "page fault requesting VM aligned page(10240)",
            "page fault requesting VM aligned page(20480)",
        ]
    );
    assert_eq!(outcome.reports[0].memory.page_faults, 2);
}

#[test]
fn bad_port_halts_only_that_processor() {
    let outcome = Network::builder(ProcessorConfig::default())
        .processor(0, program(&["IN 9", "STOP"]))
        .processor(1, program(&["LOADNUM 3", "STOP"]))
        .build(Console::default())
        .unwrap()
        .run()
        .unwrap();
    assert!(outcome.reports[0].error.is_some());
    assert_eq!(outcome.reports[1].accumulator, 3.0);
    assert!(outcome.reports[1].error.is_none());
}

#[test]
fn unmatched_in_stalls_the_network() {
    let network = Network::builder(ProcessorConfig::default())
        .processor(0, program(&["IN 0", "STOP"]))
        .processor(1, program(&["STOP"]))
        .build(Console::default())
        .unwrap();
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = network.run();
        let _ = done_tx.send(());
    });
    assert_eq!(
        done_rx.recv_timeout(Duration::from_millis(300)),
        Err(mpsc::RecvTimeoutError::Timeout)
    );
}

#[test]
fn hand_wired_processors_share_a_channel() {
    let channel = Port::rendezvous();
    let config = ProcessorConfig::default();
    let mut producer = Processor::new(0, program(&["LOADNUM 7", "OUT 4", "STOP"]), config);
    let mut consumer = Processor::new(1, program(&["IN 2", "STOP"]), config);
    producer.bind_port(4, channel.clone()).unwrap();
    consumer.bind_port(2, channel).unwrap();
    assert!(consumer.bind_port(5, Port::rendezvous()).is_err());

    let worker = thread::spawn(move || {
        producer.run().unwrap();
        producer
    });
    consumer.run().unwrap();
    let producer = worker.join().unwrap();
    assert_eq!(consumer.accumulator(), 7.0);
    assert_eq!(producer.state(), ProcessorState::Halted);
}

#[test]
fn runs_from_topology_file() {
    let dir = std::env::temp_dir().join(format!("hal_topology_run_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("a.hal"), "LOADNUM 6\nOUT 0\nSTOP\n").unwrap();
    std::fs::write(dir.join("b.hal"), "IN 0\nMULNUM 7\nOUT 3\nSTOP\n").unwrap();
    std::fs::write(
        dir.join("net.txt"),
        "HAL-Prozessoren:\n0 a.hal\n1 b.hal\nHAL-Verbindungen:\n0:0>1:0\nHAL-Stdout:\n1:3>stdout\n",
    )
    .unwrap();
    let fault_log = dir.join("faults.log");

    let topology = Topology::load(&dir.join("net.txt")).unwrap();
    let config = NetworkConfig {
        fault_log: Some(fault_log.clone()),
        ..NetworkConfig::default()
    };
    let out = SharedLines::new();
    let outcome = NetworkBuilder::from_topology(&topology, &config)
        .unwrap()
        .build(Console::new(std::io::empty(), out.clone()))
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(out.snapshot(), vec!["42"]);
    assert_eq!(outcome.reports.len(), 2);
    assert!(fault_log.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn undecodable_input_reads_as_zero() {
    let outcome = Network::builder(ProcessorConfig::default())
        .processor(0, program(&["LOADNUM 5", "IN 0", "STOP"]))
        .stdin(PortRef::new(0, 0))
        .build(Console::new(Cursor::new("abc\n"), SharedLines::new()))
        .unwrap()
        .run()
        .unwrap();
    let report = &outcome.reports[0];
    assert_eq!(report.accumulator, 0.0);
    assert_eq!(report.state, ProcessorState::Halted);
    assert!(report.error.is_none());
}

#[test]
fn unread_input_does_not_hold_up_the_run() {
    let network = Network::builder(ProcessorConfig::default())
        .processor(0, program(&["IN 0", "STOP"]))
        .stdin(PortRef::new(0, 0))
        .build(Console::new(Cursor::new("1\n2\n3\n4\n"), SharedLines::new()))
        .unwrap();
    let (done_tx, done_rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = done_tx.send(network.run().map(|outcome| outcome.reports));
    });
    let reports = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("run returns once the processor halts")
        .unwrap();
    assert_eq!(reports[0].accumulator, 1.0);
    assert!(reports[0].error.is_none());
}
