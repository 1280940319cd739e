//! Tool output fixtures captured from real simctl / adb / aapt runs

use mdeck_core::{DeviceState, Platform, ShutdownDevices};
use mdeck_daemon::packages::{parse_aapt_label, parse_aapt_package, parse_xml_plist};
use mdeck_daemon::{
    classify_simulators, only_emulators, parse_adb_devices, parse_avd_list,
    parse_running_avd_name, parse_simctl_devices, reconcile_emulators,
};

const SIMCTL_LIST: &str = include_str!("fixtures/simctl_list.json");
const ADB_DEVICES: &str = include_str!("fixtures/adb_devices.txt");
const EMU_AVD_NAME: &str = include_str!("fixtures/emu_avd_name.txt");
const LIST_AVDS: &str = include_str!("fixtures/emulator_list_avds.txt");

#[test]
fn test_simctl_fixture_skips_transitional_records() {
    let simulators = parse_simctl_devices(SIMCTL_LIST).unwrap();

    assert_eq!(simulators.len(), 4);
    assert!(simulators.iter().all(|s| s.name != "iPhone 7 Plus"));
    let unavailable = simulators.iter().find(|s| s.name == "iPhone 7").unwrap();
    assert!(!unavailable.is_available);
}

#[test]
fn test_simctl_fixture_groups_by_os_version_descending() {
    let snapshot = classify_simulators(parse_simctl_devices(SIMCTL_LIST).unwrap());

    assert_eq!(snapshot.platform, Platform::IOS);
    assert_eq!(snapshot.booted.len(), 1);
    assert_eq!(snapshot.booted[0].display_name(), "iPhone 15");

    let ShutdownDevices::Grouped(groups) = &snapshot.shutdown else {
        panic!("iOS shutdown devices must be grouped");
    };
    let oses: Vec<&str> = groups.iter().map(|g| g.os.as_str()).collect();
    assert_eq!(oses, vec!["iOS 17.2", "iOS 10.0", "iOS 9.3"]);
}

#[test]
fn test_adb_fixture_keeps_only_emulators() {
    let emulators = only_emulators(parse_adb_devices(ADB_DEVICES));

    let serials: Vec<&str> = emulators.iter().map(|e| e.serial.as_str()).collect();
    assert_eq!(serials, vec!["emulator-5554", "emulator-5556"]);
    assert_eq!(emulators[0].state, DeviceState::Booted);
    assert_eq!(emulators[1].state, DeviceState::Shutdown);
}

#[test]
fn test_android_fixtures_reconcile() {
    let mut emulators = only_emulators(parse_adb_devices(ADB_DEVICES));
    let avd_name = parse_running_avd_name(EMU_AVD_NAME).unwrap();
    assert_eq!(avd_name, "Pixel_8_API_34");
    emulators[0] = emulators[0].clone().with_avd_name(avd_name);

    let snapshot = reconcile_emulators(emulators, &parse_avd_list(LIST_AVDS));

    let booted: Vec<&str> = snapshot.booted.iter().map(|d| d.id()).collect();
    assert_eq!(booted, vec!["emulator-5554"]);
    let shutdown: Vec<&str> = snapshot.shutdown.iter().map(|d| d.id()).collect();
    assert_eq!(
        shutdown,
        vec!["emulator-5556", "avd:Small_Phone_API_35", "avd:Tablet_API_33"]
    );
    let tablet = snapshot.find("avd:Tablet_API_33").unwrap();
    assert_eq!(tablet.os_or_api_level().as_deref(), Some("API 33"));
}

#[test]
fn test_aapt_badging_fixture() {
    let output = include_str!("fixtures/aapt_badging.txt");
    assert_eq!(parse_aapt_package(output).as_deref(), Some("com.example.deck"));
    assert_eq!(parse_aapt_label(output).as_deref(), Some("Deck Demo"));
}

#[test]
fn test_info_plist_fixture() {
    let info = parse_xml_plist(include_str!("fixtures/Info.plist"));
    assert_eq!(info.bundle_identifier.as_deref(), Some("com.example.deckdemo"));
    assert_eq!(info.executable.as_deref(), Some("DeckDemo"));
    assert_eq!(info.represented_name(), Some("Deck Demo"));
}
