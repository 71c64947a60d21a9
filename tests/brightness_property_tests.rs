use backlight_manager::backlight::{adjusted_brightness, clamp_brightness, percent_to_units};
use backlight_manager::daemon::ambient_brightness;
use backlight_manager::ipc::Command;
use proptest::prelude::*;

proptest! {
    #[test]
    fn clamped_value_is_always_in_device_range(value in any::<i64>(), max in 1i64..100_000) {
        let clamped = clamp_brightness(value, max);
        prop_assert!((1..=max).contains(&clamped));
        if (1..=max).contains(&value) {
            prop_assert_eq!(clamped, value);
        }
    }

    #[test]
    fn adjustment_moves_in_requested_direction(
        current in 1i64..5000,
        max in 1i64..5000,
        percent in -200i32..200,
    ) {
        let target = adjusted_brightness(current, max, percent);
        if percent >= 0 {
            prop_assert!(target >= current);
        } else {
            prop_assert!(target <= current);
        }
    }

    #[test]
    fn ambient_target_never_below_floor(
        illumination in 0.0f64..100_000.0,
        factor in 0.0f64..100.0,
        min_brightness in 0u8..=100,
        max in 1i64..10_000,
    ) {
        let floor = percent_to_units(min_brightness, max);
        prop_assert!(floor <= max);
        prop_assert!(ambient_brightness(illumination, factor, floor) >= floor);
    }

    #[test]
    fn any_five_bytes_decode_or_reject_cleanly(bytes in proptest::array::uniform5(any::<u8>())) {
        match Command::decode(&bytes) {
            Some(command) => prop_assert_eq!(command.encode(), bytes),
            None => prop_assert!(bytes[4] > 1),
        }
    }
}
