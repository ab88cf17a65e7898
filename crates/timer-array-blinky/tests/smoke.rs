#![cfg(not(target_arch = "wasm32"))]

use predicates::prelude::*;

fn blinky() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("timer-array-blinky")
}

#[test]
fn default_run_blinks_ten_times_then_stops() {
    blinky()
        .assert()
        .success()
        .stdout(predicate::str::contains("toggles=10 led=off fired=11"));
}

#[test]
fn run_ending_before_stop_leaves_led_on() {
    blinky()
        .args(["--run-ms", "1500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("toggles=3 led=on fired=3"));
}

#[test]
fn wide_counter_allows_long_periods() {
    blinky()
        .args([
            "--counter-bits",
            "32",
            "--toggle-ms",
            "10000",
            "--stop-ms",
            "20000",
            "--run-ms",
            "60000",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("toggles=2 led=off fired=3"));
}

#[test]
fn unsupported_counter_width_is_rejected() {
    blinky()
        .args(["--counter-bits", "24"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported counter width: 24 bits"));
}

#[test]
fn period_longer_than_counter_range_is_rejected() {
    blinky()
        .args(["--toggle-ms", "7000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--toggle-ms 7000 does not fit a 16-bit counter"));
}

#[test]
fn tick_faster_than_input_clock_is_rejected() {
    blinky()
        .args(["--input-hz", "1000", "--tick-hz", "2000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid frequency division 0"));
}

#[test]
fn run_time_overflowing_the_tick_count_is_rejected() {
    blinky()
        .args(["--run-ms", "18446744073709551615"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--run-ms 18446744073709551615 is too long"));
}
