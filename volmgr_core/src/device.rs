//! Device registry (§4.1): scanning superblocks, and the in-memory
//! `FsDevices`/`Device` records that everything else in this crate reads.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, VolumeError};

/// Size of the superblock candidate block read by `scan_one_device`.
pub const SUPERBLOCK_SIZE: usize = 4096;

/// Fixed byte sequence identifying a superblock candidate as ours.
pub const SUPER_MAGIC: [u8; 8] = *b"VM_SB_01";

const MAGIC_OFFSET: usize = 0;
const FSID_OFFSET: usize = 8;
const DEVID_OFFSET: usize = 24;
const GENERATION_OFFSET: usize = 32;
const NUM_DEVICES_OFFSET: usize = 40;

/// One physical device known to a filesystem.
#[derive(Debug)]
pub struct Device {
    pub devid: u64,
    pub uuid: Uuid,
    pub fsid: Uuid,
    pub path: PathBuf,
    pub handle: Option<File>,
    pub total_bytes: u64,
    pub bytes_used: u64,
    pub io_align: u32,
    pub io_width: u32,
    pub sector_size: u32,
    pub dev_type: u64,
}

impl Device {
    pub fn avail_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.bytes_used)
    }
}

/// One filesystem instance: an ordered set of devices sharing an FSID.
#[derive(Debug)]
pub struct FsDevices {
    pub fsid: Uuid,
    pub devices: Vec<Device>,
    pub latest_devid: u64,
    pub latest_trans: u64,
    pub lowest_devid: u64,
    /// Rotating start index for chunk-allocation device selection (§4.3,
    /// §9: "ordered vector with a rotating cursor" for fair rotation
    /// across repeated allocations).
    pub alloc_cursor: usize,
}

impl FsDevices {
    /// Construct an empty filesystem record directly. Most callers reach
    /// `FsDevices` through [`FilesystemRegistry::device_list_add`]; this
    /// is exposed for fixture-driven CLI commands and tests that build
    /// one up without going through a simulated scan.
    pub fn new(fsid: Uuid, devid: u64, found_transid: u64) -> FsDevices {
        FsDevices {
            fsid,
            devices: Vec::new(),
            latest_devid: devid,
            latest_trans: found_transid,
            lowest_devid: u64::MAX,
            alloc_cursor: 0,
        }
    }

    pub fn find_device(&self, devid: u64) -> Option<&Device> {
        self.devices.iter().find(|d| d.devid == devid)
    }

    pub fn find_device_mut(&mut self, devid: u64) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.devid == devid)
    }

    pub fn latest_device(&self) -> Option<&Device> {
        self.find_device(self.latest_devid)
    }

    pub fn lowest_device(&self) -> Option<&Device> {
        self.find_device(self.lowest_devid)
    }

    /// Open a host file descriptor for every known device (§4.1).
    /// On failure mid-iteration, already-opened descriptors are closed
    /// before the error is returned — the registry never leaks fds.
    pub fn open_all(&mut self) -> Result<()> {
        let mut opened = Vec::new();
        for idx in 0..self.devices.len() {
            match OpenOptions::new().read(true).write(true).open(&self.devices[idx].path) {
                Ok(f) => {
                    self.devices[idx].handle = Some(f);
                    opened.push(idx);
                }
                Err(e) => {
                    for i in opened {
                        self.devices[i].handle = None;
                    }
                    return Err(VolumeError::Io(e));
                }
            }
        }
        Ok(())
    }

    /// Release host file descriptors. Handles are set to `None` (the
    /// "invalid sentinel" of §5) rather than merely dropped in place, so
    /// later code can tell a closed device from one that was never opened.
    pub fn close_all(&mut self) {
        for device in &mut self.devices {
            device.handle = None;
        }
    }
}

/// A superblock candidate read from a 4 KiB block.
#[derive(Debug, Clone, Copy)]
pub struct ScannedSuper {
    pub devid: u64,
    pub fsid: Uuid,
    pub found_transid: u64,
    pub num_devices: u32,
}

/// Read a 4 KiB superblock candidate at `super_offset` and parse it
/// (§4.1). Returns `NotBtrfs` if the magic doesn't match, `Io` on any
/// read failure — both are treated by the caller as "skip this candidate".
pub fn read_superblock_candidate(fd: &mut File, super_offset: u64) -> Result<ScannedSuper> {
    fd.seek(SeekFrom::Start(super_offset))?;
    let mut block = [0u8; SUPERBLOCK_SIZE];
    fd.read_exact(&mut block)?;

    if block[MAGIC_OFFSET..MAGIC_OFFSET + SUPER_MAGIC.len()] != SUPER_MAGIC {
        return Err(VolumeError::NotBtrfs);
    }

    let fsid = Uuid::from_slice(&block[FSID_OFFSET..FSID_OFFSET + 16])
        .map_err(|e| VolumeError::Corruption(format!("invalid fsid bytes: {e}")))?;
    let mut devid_rdr = &block[DEVID_OFFSET..DEVID_OFFSET + 8];
    let devid = devid_rdr.read_u64::<LittleEndian>()?;
    let mut gen_rdr = &block[GENERATION_OFFSET..GENERATION_OFFSET + 8];
    let found_transid = gen_rdr.read_u64::<LittleEndian>()?;
    let mut nd_rdr = &block[NUM_DEVICES_OFFSET..NUM_DEVICES_OFFSET + 4];
    let num_devices = nd_rdr.read_u32::<LittleEndian>()?;

    Ok(ScannedSuper { devid, fsid, found_transid, num_devices })
}

/// Process-wide table of known filesystems, keyed by FSID (§5). Modeled
/// as an explicit value owned by the caller (the CLI's `main`, or a
/// test) rather than a global `static`, so independent tests don't share
/// state — see SPEC_FULL.md §3's "ambient addition" note.
#[derive(Debug, Default)]
pub struct FilesystemRegistry {
    filesystems: Vec<FsDevices>,
}

impl FilesystemRegistry {
    pub fn new() -> FilesystemRegistry {
        FilesystemRegistry { filesystems: Vec::new() }
    }

    pub fn find(&self, fsid: &Uuid) -> Option<&FsDevices> {
        self.filesystems.iter().find(|f| &f.fsid == fsid)
    }

    pub fn find_mut(&mut self, fsid: &Uuid) -> Option<&mut FsDevices> {
        self.filesystems.iter_mut().find(|f| &f.fsid == fsid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FsDevices> {
        self.filesystems.iter()
    }

    /// `device_list_add` (§4.1): fold one scanned superblock into the
    /// registry, returning the (possibly newly created) `FsDevices`.
    pub fn device_list_add(&mut self, path: &Path, scanned: &ScannedSuper) -> &mut FsDevices {
        let fs_idx = match self.filesystems.iter().position(|f| f.fsid == scanned.fsid) {
            Some(idx) => idx,
            None => {
                self.filesystems.push(FsDevices::new(scanned.fsid, scanned.devid, scanned.found_transid));
                self.filesystems.len() - 1
            }
        };
        let fs = &mut self.filesystems[fs_idx];

        if fs.find_device(scanned.devid).is_none() {
            fs.devices.push(Device {
                devid: scanned.devid,
                uuid: Uuid::nil(),
                fsid: scanned.fsid,
                path: path.to_path_buf(),
                handle: None,
                total_bytes: 0,
                bytes_used: 0,
                io_align: 0,
                io_width: 0,
                sector_size: 0,
                dev_type: 0,
            });
        }

        // latest_devid and latest_trans must move together.
        if scanned.found_transid > fs.latest_trans {
            fs.latest_trans = scanned.found_transid;
            fs.latest_devid = scanned.devid;
        }

        if scanned.devid < fs.lowest_devid {
            fs.lowest_devid = scanned.devid;
        }

        fs
    }

    /// Convenience wrapper used by the CLI's `device scan` subcommand:
    /// open a host path, scan it, fold the result into the registry.
    /// Failures are logged and swallowed so scanning a directory full of
    /// unrelated files is safe (§7).
    pub fn scan_path(&mut self, path: &Path, super_offset: u64) -> Option<Uuid> {
        let mut fd = match OpenOptions::new().read(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("skipping {}: {}", path.display(), e);
                return None;
            }
        };
        match read_superblock_candidate(&mut fd, super_offset) {
            Ok(scanned) => {
                let fsid = scanned.fsid;
                self.device_list_add(path, &scanned);
                debug!("scanned {} as devid {} of fsid {}", path.display(), scanned.devid, fsid);
                Some(fsid)
            }
            Err(VolumeError::NotBtrfs) => {
                debug!("skipping {}: not a recognized superblock", path.display());
                None
            }
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture_super(path: &Path, fsid: Uuid, devid: u64, transid: u64, num_devices: u32) {
        let mut block = vec![0u8; SUPERBLOCK_SIZE];
        block[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(&SUPER_MAGIC);
        block[FSID_OFFSET..FSID_OFFSET + 16].copy_from_slice(fsid.as_bytes());
        block[DEVID_OFFSET..DEVID_OFFSET + 8].copy_from_slice(&devid.to_le_bytes());
        block[GENERATION_OFFSET..GENERATION_OFFSET + 8].copy_from_slice(&transid.to_le_bytes());
        block[NUM_DEVICES_OFFSET..NUM_DEVICES_OFFSET + 4].copy_from_slice(&num_devices.to_le_bytes());
        let mut f = File::create(path).unwrap();
        f.write_all(&block).unwrap();
    }

    struct TestTempDir {
        path: PathBuf,
    }

    impl TestTempDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!("volmgr-device-test-{}-{}", std::process::id(), name));
            std::fs::create_dir_all(&path).unwrap();
            TestTempDir { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestTempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn scan_rejects_bad_magic() {
        let dir = TestTempDir::new("bad-magic");
        let path = dir.path().join("dev0");
        std::fs::write(&path, vec![0u8; SUPERBLOCK_SIZE]).unwrap();
        let mut fd = File::open(&path).unwrap();
        assert!(matches!(read_superblock_candidate(&mut fd, 0), Err(VolumeError::NotBtrfs)));
    }

    #[test]
    fn scan_parses_valid_superblock() {
        let dir = TestTempDir::new("valid");
        let fsid = Uuid::new_v4();
        let path = dir.path().join("dev0");
        write_fixture_super(&path, fsid, 3, 42, 2);
        let mut fd = File::open(&path).unwrap();
        let scanned = read_superblock_candidate(&mut fd, 0).unwrap();
        assert_eq!(scanned.devid, 3);
        assert_eq!(scanned.fsid, fsid);
        assert_eq!(scanned.found_transid, 42);
        assert_eq!(scanned.num_devices, 2);
    }

    #[test]
    fn device_list_add_converges_multiple_devices_to_one_fs_devices() {
        let fsid = Uuid::new_v4();
        let mut registry = FilesystemRegistry::new();

        let dev1 = ScannedSuper { devid: 1, fsid, found_transid: 10, num_devices: 2 };
        let dev2 = ScannedSuper { devid: 2, fsid, found_transid: 20, num_devices: 2 };

        registry.device_list_add(Path::new("/dev/fake1"), &dev1);
        registry.device_list_add(Path::new("/dev/fake2"), &dev2);

        let fs = registry.find(&fsid).unwrap();
        assert_eq!(fs.devices.len(), 2);
        // dev2 has the higher generation, so latest_devid/latest_trans
        // must have moved together onto it.
        assert_eq!(fs.latest_devid, 2);
        assert_eq!(fs.latest_trans, 20);
        assert_eq!(fs.lowest_devid, 1);
    }

    #[test]
    fn device_list_add_ignores_lower_generation() {
        let fsid = Uuid::new_v4();
        let mut registry = FilesystemRegistry::new();

        registry.device_list_add(Path::new("/dev/a"), &ScannedSuper { devid: 1, fsid, found_transid: 50, num_devices: 1 });
        registry.device_list_add(Path::new("/dev/b"), &ScannedSuper { devid: 2, fsid, found_transid: 5, num_devices: 1 });

        let fs = registry.find(&fsid).unwrap();
        assert_eq!(fs.latest_devid, 1);
        assert_eq!(fs.latest_trans, 50);
        assert_eq!(fs.lowest_devid, 1);
    }

    #[test]
    fn scan_path_skips_non_superblock_files_quietly() {
        let dir = TestTempDir::new("scan-path");
        let path = dir.path().join("not-a-superblock");
        std::fs::write(&path, b"hello").unwrap();
        let mut registry = FilesystemRegistry::new();
        assert!(registry.scan_path(&path, 0).is_none());
        assert_eq!(registry.iter().count(), 0);
    }

    #[test]
    fn open_all_then_close_all_clears_handles() {
        let dir = TestTempDir::new("open-close");
        let fsid = Uuid::new_v4();
        let path = dir.path().join("dev0");
        write_fixture_super(&path, fsid, 1, 1, 1);

        let mut registry = FilesystemRegistry::new();
        let mut fd = File::open(&path).unwrap();
        let scanned = read_superblock_candidate(&mut fd, 0).unwrap();
        registry.device_list_add(&path, &scanned);

        let fs = registry.find_mut(&fsid).unwrap();
        fs.open_all().unwrap();
        assert!(fs.devices[0].handle.is_some());
        fs.close_all();
        assert!(fs.devices[0].handle.is_none());
    }
}
