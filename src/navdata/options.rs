//! # NavData Option Registry
//!
//! One struct per option tag, each decoded verbatim from its fixed layout.
//!
//! Every record on the wire starts with a 4-byte option header
//! (`tag: u16, size: u16`). The registered size of a record includes that
//! header, so [`OptionRecord::SIZE`] is what the drone puts in `size`.
//!
//! The registry is defined once by `nav_options!`, which generates the
//! record structs, the [`NavOption`] sum type, the tag lookup functions and
//! the typed accessors on [`NavData`].

use bytes::Buf;

use super::field::{Bool32, Field, Matrix33, ScreenPoint, Vector21, Vector31};
use super::NavData;

/// Width of the `tag, size` header preceding every option record
pub const OPTION_HEADER_SIZE: usize = 4;

/// Tag of the checksum record that closes every frame
pub const CHECKSUM_TAG: u16 = 0xFFFF;

const NB_ACCS: usize = 3;
const NB_GYROS: usize = 3;
const NB_DETECTION_RESULTS: usize = 4;
const NB_TRACKERS: usize = 6 * 5;
const MAX_CUSTOM_TIME_SAVE: usize = 20;

/// A fixed-layout NavData option record
pub trait OptionRecord: Sized {
    /// Option tag
    const TAG: u16;

    /// Record width including the option header
    const SIZE: usize;

    /// Read the record body (everything after the option header)
    fn read_body<B: Buf>(buf: &mut B) -> Self;

    /// Decode a record from its `SIZE` bytes, header included.
    ///
    /// Returns `None` if `record` is shorter than `SIZE`.
    fn decode(record: &[u8]) -> Option<Self> {
        if record.len() < Self::SIZE {
            return None;
        }
        let mut body = &record[OPTION_HEADER_SIZE..Self::SIZE];
        Some(Self::read_body(&mut body))
    }
}

macro_rules! nav_options {
    ($(
        $(#[$meta:meta])*
        $tag:literal => $name:ident as $accessor:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name {
                $( $(#[$fmeta])* pub $field: $ty, )*
            }

            impl OptionRecord for $name {
                const TAG: u16 = $tag;
                const SIZE: usize = OPTION_HEADER_SIZE $( + <$ty as Field>::SIZE )*;

                fn read_body<B: Buf>(buf: &mut B) -> Self {
                    Self {
                        $( $field: <$ty as Field>::read(buf), )*
                    }
                }
            }
        )*

        /// Any decoded option record
        #[derive(Debug, Clone, PartialEq)]
        pub enum NavOption {
            $( $name($name), )*
        }

        impl NavOption {
            /// Tag this record was registered under
            pub fn tag(&self) -> u16 {
                match self {
                    $( NavOption::$name(_) => $tag, )*
                }
            }
        }

        /// Every registered tag, in declaration order
        pub const REGISTERED_TAGS: &[u16] = &[$( $tag ),*];

        /// Registered record width for `tag`, header included
        pub fn layout_size(tag: u16) -> Option<usize> {
            match tag {
                $( $tag => Some(<$name as OptionRecord>::SIZE), )*
                _ => None,
            }
        }

        /// Decode the record for `tag` from its bytes, header included.
        ///
        /// Returns `None` for unregistered tags or short input.
        pub fn decode_option(tag: u16, record: &[u8]) -> Option<NavOption> {
            match tag {
                $( $tag => $name::decode(record).map(NavOption::$name), )*
                _ => None,
            }
        }

        impl NavData {
            $(
                #[doc = concat!("The `", stringify!($name), "` record, if the frame carried one")]
                pub fn $accessor(&self) -> Option<&$name> {
                    match self.options.get(&$tag) {
                        Some(NavOption::$name(record)) => Some(record),
                        _ => None,
                    }
                }
            )*
        }
    };
}

nav_options! {
    /// Minimal navigation data for all flights
    0 => Demo as demo {
        /// Control state (landed, flying, hovering...)
        ctrl_state: u32,
        /// Battery charge in percent
        vbat_flying_percentage: u32,
        /// Pitch in milli-degrees
        theta: f32,
        /// Roll in milli-degrees
        phi: f32,
        /// Yaw in milli-degrees
        psi: f32,
        /// Altitude in centimetres
        altitude: i32,
        /// Estimated linear velocity, x
        vx: f32,
        /// Estimated linear velocity, y
        vy: f32,
        /// Estimated linear velocity, z
        vz: f32,
        num_frames: u32,
        detection_camera_rot: Matrix33,
        detection_camera_trans: Vector31,
        detection_tag_index: u32,
        detection_camera_type: u32,
        drone_camera_rot: Matrix33,
        drone_camera_trans: Vector31,
    }

    /// Timestamp: top 11 bits seconds, low 21 bits microseconds
    1 => Time as time {
        time: u32,
    }

    /// Raw sensor measurements
    2 => RawMeasures as raw_measures {
        raw_accs: [u16; NB_ACCS],
        raw_gyros: [i16; NB_GYROS],
        raw_gyros_110: [i16; 2],
        /// Battery voltage raw (mV)
        vbat_raw: u32,
        us_debut_echo: u16,
        us_fin_echo: u16,
        us_association_echo: u16,
        us_distance_echo: u16,
        us_courbe_temps: u16,
        us_courbe_valeur: u16,
        us_courbe_ref: u16,
        flag_echo_ini: u16,
        nb_echo: u16,
        sum_echo: u32,
        alt_temp_raw: i32,
        gradient: i16,
    }

    /// Physical sensor measurements
    3 => PhysMeasures as phys_measures {
        accs_temp: f32,
        gyro_temp: u16,
        phys_accs: [f32; NB_ACCS],
        phys_gyros: [f32; NB_GYROS],
        alim3v3: u32,
        vref_epson: u32,
        vref_idg: u32,
    }

    4 => GyrosOffsets as gyros_offsets {
        offset_g: [f32; NB_GYROS],
    }

    5 => EulerAngles as euler_angles {
        theta_a: f32,
        phi_a: f32,
    }

    6 => References as references {
        ref_theta: i32,
        ref_phi: i32,
        ref_theta_i: i32,
        ref_phi_i: i32,
        ref_pitch: i32,
        ref_roll: i32,
        ref_yaw: i32,
        ref_psi: i32,
        vx_ref: f32,
        vy_ref: f32,
        theta_mod: f32,
        phi_mod: f32,
        k_v_x: f32,
        k_v_y: f32,
        k_mode: u32,
        ui_time: f32,
        ui_theta: f32,
        ui_phi: f32,
        ui_psi: f32,
        ui_psi_accuracy: f32,
        ui_seq: i32,
    }

    7 => Trims as trims {
        angular_rates_trim_r: f32,
        euler_angles_trim_theta: f32,
        euler_angles_trim_phi: f32,
    }

    8 => RcReferences as rc_references {
        rc_ref_pitch: i32,
        rc_ref_roll: i32,
        rc_ref_yaw: i32,
        rc_ref_gaz: i32,
        rc_ref_ag: i32,
    }

    /// Motor commands and controller outputs
    9 => Pwm as pwm {
        motor1: u8,
        motor2: u8,
        motor3: u8,
        motor4: u8,
        sat_motor1: u8,
        sat_motor2: u8,
        sat_motor3: u8,
        sat_motor4: u8,
        gaz_feed_forward: f32,
        gaz_altitude: f32,
        altitude_integral: f32,
        vz_ref: f32,
        u_pitch: i32,
        u_roll: i32,
        u_yaw: i32,
        yaw_u_i: f32,
        u_pitch_planif: i32,
        u_roll_planif: i32,
        u_yaw_planif: i32,
        u_gaz_planif: f32,
        current_motor1: u16,
        current_motor2: u16,
        current_motor3: u16,
        current_motor4: u16,
        altitude_prop: f32,
        altitude_der: f32,
    }

    10 => Altitude as altitude {
        altitude_vision: i32,
        altitude_vz: f32,
        altitude_ref: i32,
        altitude_raw: i32,
        obs_acc_z: f32,
        obs_alt: f32,
        obs_x: Vector31,
        obs_state: u32,
        est_vb: Vector21,
        est_state: u32,
    }

    11 => VisionRaw as vision_raw {
        vision_tx_raw: f32,
        vision_ty_raw: f32,
        vision_tz_raw: f32,
    }

    /// Optical flow
    12 => VisionOf as vision_of {
        of_dx: [f32; 5],
        of_dy: [f32; 5],
    }

    13 => Vision as vision {
        vision_state: u32,
        vision_misc: i32,
        vision_phi_trim: f32,
        vision_phi_ref_prop: f32,
        vision_theta_trim: f32,
        vision_theta_ref_prop: f32,
        new_raw_picture: i32,
        theta_capture: f32,
        phi_capture: f32,
        psi_capture: f32,
        altitude_capture: i32,
        /// Capture time in TSECDEC format
        time_capture: u32,
        body_v: Vector31,
        delta_phi: f32,
        delta_theta: f32,
        delta_psi: f32,
        gold_defined: u32,
        gold_reset: u32,
        gold_x: f32,
        gold_y: f32,
    }

    14 => VisionPerf as vision_perf {
        time_szo: f32,
        time_corners: f32,
        time_compute: f32,
        time_tracking: f32,
        time_trans: f32,
        time_update: f32,
        time_custom: [f32; MAX_CUSTOM_TIME_SAVE],
    }

    15 => TrackersSend as trackers_send {
        locked: [i32; NB_TRACKERS],
        point: [ScreenPoint; NB_TRACKERS],
    }

    /// Tag detection results
    16 => VisionDetect as vision_detect {
        nb_detected: u32,
        detection_type: [u32; NB_DETECTION_RESULTS],
        xc: [u32; NB_DETECTION_RESULTS],
        yc: [u32; NB_DETECTION_RESULTS],
        width: [u32; NB_DETECTION_RESULTS],
        height: [u32; NB_DETECTION_RESULTS],
        dist: [u32; NB_DETECTION_RESULTS],
        orientation_angle: [f32; NB_DETECTION_RESULTS],
        rotation: [Matrix33; NB_DETECTION_RESULTS],
        translation: [Vector31; NB_DETECTION_RESULTS],
        camera_source: [u32; NB_DETECTION_RESULTS],
    }

    17 => Watchdog as watchdog {
        watchdog: i32,
    }

    18 => AdcDataFrame as adc_data_frame {
        version: u32,
        data_frame: [u8; 32],
    }

    /// Video encoder and link quality statistics
    19 => VideoStream as video_stream {
        /// Quantizer reference used to encode the frame [1:31]
        quant: u8,
        frame_size: u32,
        frame_number: u32,
        atcmd_ref_seq: u32,
        /// Mean time between two consecutive REF commands (ms)
        atcmd_mean_ref_gap: u32,
        atcmd_var_ref_gap: f32,
        atcmd_ref_quality: u32,
        out_bitrate: u32,
        desired_bitrate: u32,
        data1: i32,
        data2: i32,
        data3: i32,
        data4: i32,
        data5: i32,
        tcp_queue_level: u32,
        fifo_queue_level: u32,
    }

    20 => Games as games {
        double_tap_counter: u32,
        finish_line_counter: u32,
    }

    21 => PressureRaw as pressure_raw {
        up: i32,
        ut: i16,
        temperature_meas: i32,
        pression_meas: i32,
    }

    22 => Magneto as magneto {
        mx: i16,
        my: i16,
        mz: i16,
        /// Body-frame field in mG
        magneto_raw: Vector31,
        magneto_rectified: Vector31,
        magneto_offset: Vector31,
        heading_unwrapped: f32,
        heading_gyro_unwrapped: f32,
        heading_fusion_unwrapped: f32,
        magneto_calibration_ok: u8,
        magneto_state: u32,
        magneto_radius: f32,
        error_mean: f32,
        error_var: f32,
    }

    23 => WindSpeed as wind_speed {
        /// Estimated wind speed (m/s)
        wind_speed: f32,
        /// Estimated wind direction in the North-East frame (rad)
        wind_angle: f32,
        wind_compensation_theta: f32,
        wind_compensation_phi: f32,
        state_x1: f32,
        state_x2: f32,
        state_x3: f32,
        state_x4: f32,
        state_x5: f32,
        state_x6: f32,
        magneto_debug1: f32,
        magneto_debug2: f32,
        magneto_debug3: f32,
    }

    24 => KalmanPressure as kalman_pressure {
        offset_pressure: f32,
        est_z: f32,
        est_zdot: f32,
        est_bias_pwm: f32,
        est_biais_pression: f32,
        offset_us: f32,
        prediction_us: f32,
        cov_alt: f32,
        cov_pwm: f32,
        cov_vitesse: f32,
        bool_effet_sol: Bool32,
        somme_inno: f32,
        flag_rejet_us: Bool32,
        u_multisinus: f32,
        gaz_altitude: f32,
        flag_multisinus: Bool32,
        flag_multisinus_debut: Bool32,
    }

    25 => HdVideoStream as hd_video_stream {
        hdvideo_state: u32,
        storage_fifo_nb_packets: u32,
        storage_fifo_size: u32,
        /// USB key size in kB, 0 without a key
        usbkey_size: u32,
        usbkey_freespace: u32,
        frame_number: u32,
        /// Seconds of recording left
        usbkey_remaining_time: u32,
    }

    26 => Wifi as wifi {
        link_quality: u32,
    }

    27 => Zimmu3000 as zimmu_3000 {
        vzimmu_lsb: i32,
        vzfind: f32,
    }

    /// Sum of all preceding bytes of the frame
    0xFFFF => Checksum as checksum {
        value: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes_include_header() {
        let expected: &[(u16, usize)] = &[
            (0, 148),
            (1, 8),
            (2, 52),
            (3, 46),
            (4, 16),
            (5, 12),
            (6, 88),
            (7, 16),
            (8, 24),
            (9, 76),
            (10, 56),
            (11, 16),
            (12, 44),
            (13, 92),
            (14, 108),
            (15, 364),
            (16, 328),
            (17, 8),
            (18, 40),
            (19, 65),
            (20, 12),
            (21, 18),
            (22, 75),
            (23, 56),
            (24, 72),
            (25, 32),
            (26, 8),
            (27, 12),
            (CHECKSUM_TAG, 8),
        ];

        assert_eq!(REGISTERED_TAGS.len(), expected.len());
        for &(tag, size) in expected {
            assert_eq!(layout_size(tag), Some(size), "tag {}", tag);
        }
    }

    #[test]
    fn test_unregistered_tag() {
        assert_eq!(layout_size(28), None);
        assert_eq!(decode_option(28, &[0; 64]), None);
    }

    #[test]
    fn test_decode_skips_header() {
        let mut record = vec![0x11, 0x00, 0x08, 0x00];
        record.extend_from_slice(&(-5i32).to_le_bytes());

        let option = decode_option(17, &record).unwrap();
        assert_eq!(option.tag(), 17);
        assert_eq!(option, NavOption::Watchdog(Watchdog { watchdog: -5 }));
    }

    #[test]
    fn test_decode_short_record() {
        assert_eq!(Time::decode(&[1, 0, 8, 0, 0]), None);
    }

    #[test]
    fn test_decode_demo_fields() {
        let mut record = vec![0u8; Demo::SIZE];
        record[4..8].copy_from_slice(&0x0002_0000u32.to_le_bytes());
        record[8..12].copy_from_slice(&87u32.to_le_bytes());
        record[24..28].copy_from_slice(&(-120i32).to_le_bytes());
        record[28..32].copy_from_slice(&1.5f32.to_le_bytes());

        let demo = Demo::decode(&record).unwrap();
        assert_eq!(demo.ctrl_state, 0x0002_0000);
        assert_eq!(demo.vbat_flying_percentage, 87);
        assert_eq!(demo.altitude, -120);
        assert_eq!(demo.vx, 1.5);
        assert_eq!(demo.drone_camera_trans, [0.0; 3]);
    }
}
