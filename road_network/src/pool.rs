//! Junction kernels run on a few worker threads. The control thread owns all editable state; it
//! ships self-contained requests out and commits whatever comes back, as long as nothing newer
//! was dispatched for the same junction in the meantime.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::make::junction_geometry::{junction_boundary, JunctionBoundaryRequest};
use crate::make::lane_links::{resolve_lane_links, LaneLinkRequest, ResolvedLaneLink};
use crate::{GeoAttr, JunctionID};

/// Why a kernel produced nothing.
#[derive(Clone, Debug, PartialEq)]
pub enum KernelError {
    /// The inputs couldn't produce sensible geometry
    Degenerate(String),
    /// The kernel blew up. The worker survives.
    Panicked(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::Degenerate(msg) => write!(f, "degenerate input: {}", msg),
            KernelError::Panicked(msg) => write!(f, "kernel panicked: {}", msg),
        }
    }
}

impl std::error::Error for KernelError {}

pub enum Task {
    JunctionBoundary(JunctionBoundaryRequest),
    LaneLinks(LaneLinkRequest),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum TaskKind {
    JunctionBoundary,
    LaneLinks,
}

impl Task {
    fn kind(&self) -> TaskKind {
        match self {
            Task::JunctionBoundary(_) => TaskKind::JunctionBoundary,
            Task::LaneLinks(_) => TaskKind::LaneLinks,
        }
    }
}

pub enum TaskOutput {
    JunctionBoundary(Option<GeoAttr>),
    LaneLinks(Vec<ResolvedLaneLink>),
}

struct Job {
    junction: JunctionID,
    version: u64,
    task: Task,
}

struct JobResult {
    junction: JunctionID,
    version: u64,
    kind: TaskKind,
    output: Result<TaskOutput, KernelError>,
}

/// Both halves of one junction recompute.
#[derive(Debug)]
pub struct JunctionUpdate {
    pub junction: JunctionID,
    pub version: u64,
    pub geo_attr: Result<Option<GeoAttr>, KernelError>,
    pub lane_links: Result<Vec<ResolvedLaneLink>, KernelError>,
}

#[derive(Default)]
struct Partial {
    geo_attr: Option<Result<Option<GeoAttr>, KernelError>>,
    lane_links: Option<Result<Vec<ResolvedLaneLink>, KernelError>>,
}

type Versions = Arc<RwLock<HashMap<JunctionID, u64>>>;

pub struct ExecutionPool {
    job_tx: Option<Sender<Job>>,
    result_rx: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,

    /// Shared with workers, so they can skip jobs that are already stale
    versions: Versions,
    next_version: u64,
    partial: BTreeMap<(JunctionID, u64), Partial>,
    /// Finished while waiting for something else
    ready: VecDeque<JunctionUpdate>,
}

impl ExecutionPool {
    pub fn new(num_workers: usize) -> ExecutionPool {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (result_tx, result_rx) = unbounded::<JobResult>();
        let versions: Versions = Arc::new(RwLock::new(HashMap::new()));

        let mut workers = Vec::new();
        for worker in 0..num_workers.max(1) {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let versions = versions.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("junction-worker-{}", worker))
                .spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        if !is_current(&versions, job.junction, job.version) {
                            continue;
                        }
                        let result = JobResult {
                            junction: job.junction,
                            version: job.version,
                            kind: job.task.kind(),
                            output: run_task(job.task),
                        };
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => error!("Couldn't start junction worker {}: {}", worker, err),
            }
        }

        ExecutionPool {
            job_tx: Some(job_tx),
            result_rx,
            workers,
            versions,
            next_version: 0,
            partial: BTreeMap::new(),
            ready: VecDeque::new(),
        }
    }

    /// Starts recomputing a junction. Any earlier recompute of the same junction that hasn't
    /// been collected yet becomes stale. Returns the new version.
    pub fn dispatch(
        &mut self,
        junction: JunctionID,
        boundary: JunctionBoundaryRequest,
        links: LaneLinkRequest,
    ) -> u64 {
        self.next_version += 1;
        let version = self.next_version;
        write_versions(&self.versions).insert(junction, version);
        self.partial.retain(|(j, _), _| *j != junction);
        self.ready.retain(|u| u.junction != junction);

        // Without workers, compute right here
        if self.workers.is_empty() {
            let update = JunctionUpdate {
                junction,
                version,
                geo_attr: unpack_boundary(run_task(Task::JunctionBoundary(boundary))),
                lane_links: unpack_links(run_task(Task::LaneLinks(links))),
            };
            self.ready.push_back(update);
            return version;
        }

        for task in [Task::JunctionBoundary(boundary), Task::LaneLinks(links)] {
            let job = Job {
                junction,
                version,
                task,
            };
            if let Some(ref tx) = self.job_tx {
                if tx.send(job).is_err() {
                    error!("Junction workers are gone; {} won't be recomputed", junction);
                }
            }
        }
        version
    }

    /// Forgets about any outstanding work for a junction. Its results will be dropped. Versions
    /// are never reused, so the junction's entry can go away entirely.
    pub fn invalidate(&mut self, junction: JunctionID) {
        write_versions(&self.versions).remove(&junction);
        self.partial.retain(|(j, _), _| *j != junction);
        self.ready.retain(|u| u.junction != junction);
    }

    pub fn is_current(&self, junction: JunctionID, version: u64) -> bool {
        is_current(&self.versions, junction, version)
    }

    /// How many junctions have a version on record.
    pub fn num_tracked(&self) -> usize {
        match self.versions.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Every recompute that's finished since the last call, without blocking.
    pub fn try_finished(&mut self) -> Vec<JunctionUpdate> {
        while let Ok(result) = self.result_rx.try_recv() {
            self.absorb(result);
        }
        self.ready.drain(..).collect()
    }

    /// Blocks until one particular recompute is done. Other finished updates are kept for
    /// `try_finished`. Returns `None` if that version is no longer current or the workers died.
    pub fn wait_for(&mut self, junction: JunctionID, version: u64) -> Option<JunctionUpdate> {
        loop {
            if let Some(idx) = self
                .ready
                .iter()
                .position(|u| u.junction == junction && u.version == version)
            {
                return self.ready.remove(idx);
            }
            if !self.is_current(junction, version) {
                return None;
            }
            match self.result_rx.recv() {
                Ok(result) => self.absorb(result),
                Err(_) => {
                    error!("Junction workers are gone while waiting for {}", junction);
                    return None;
                }
            }
        }
    }

    fn absorb(&mut self, result: JobResult) {
        if !self.is_current(result.junction, result.version) {
            debug!(
                "Dropping stale result for {} (version {})",
                result.junction, result.version
            );
            return;
        }
        let key = (result.junction, result.version);
        let partial = self.partial.entry(key).or_default();
        match result.output {
            Ok(TaskOutput::JunctionBoundary(geo)) => partial.geo_attr = Some(Ok(geo)),
            Ok(TaskOutput::LaneLinks(links)) => partial.lane_links = Some(Ok(links)),
            Err(err) => match result.kind {
                TaskKind::JunctionBoundary => partial.geo_attr = Some(Err(err)),
                TaskKind::LaneLinks => partial.lane_links = Some(Err(err)),
            },
        }
        if partial.geo_attr.is_some() && partial.lane_links.is_some() {
            if let Some(Partial {
                geo_attr: Some(geo_attr),
                lane_links: Some(lane_links),
            }) = self.partial.remove(&key)
            {
                self.ready.push_back(JunctionUpdate {
                    junction: key.0,
                    version: key.1,
                    geo_attr,
                    lane_links,
                });
            }
        }
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker's loop
        self.job_tx = None;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("A junction worker panicked outside of a kernel");
            }
        }
    }
}

fn run_task(task: Task) -> Result<TaskOutput, KernelError> {
    contain_panics(|| match task {
        Task::JunctionBoundary(ref req) => junction_boundary(req).map(TaskOutput::JunctionBoundary),
        Task::LaneLinks(ref req) => resolve_lane_links(req).map(TaskOutput::LaneLinks),
    })
}

fn contain_panics<F: FnOnce() -> Result<TaskOutput, KernelError>>(
    f: F,
) -> Result<TaskOutput, KernelError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(output) => output,
        Err(payload) => {
            let msg = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(KernelError::Panicked(msg))
        }
    }
}

fn unpack_boundary(
    output: Result<TaskOutput, KernelError>,
) -> Result<Option<GeoAttr>, KernelError> {
    match output? {
        TaskOutput::JunctionBoundary(geo) => Ok(geo),
        TaskOutput::LaneLinks(_) => Err(KernelError::Degenerate("mismatched output".to_string())),
    }
}

fn unpack_links(
    output: Result<TaskOutput, KernelError>,
) -> Result<Vec<ResolvedLaneLink>, KernelError> {
    match output? {
        TaskOutput::LaneLinks(links) => Ok(links),
        TaskOutput::JunctionBoundary(_) => {
            Err(KernelError::Degenerate("mismatched output".to_string()))
        }
    }
}

fn is_current(versions: &Versions, junction: JunctionID, version: u64) -> bool {
    let guard = match versions.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    matches!(guard.get(&junction), Some(&v) if v == version)
}

fn write_versions(versions: &Versions) -> std::sync::RwLockWriteGuard<HashMap<JunctionID, u64>> {
    match versions.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use geom::Pt3D;

    use super::*;
    use crate::{Direction, LinkRoad, RefRoad, RoadEnd, RoadID};

    fn boundary_req() -> JunctionBoundaryRequest {
        let east = Pt3D::new(1.0, 0.0, 0.0);
        JunctionBoundaryRequest {
            ref_roads: vec![
                RefRoad {
                    link: LinkRoad::new(RoadID(0), RoadEnd::End, Direction::Forward),
                    along_vec: east,
                    left_point: Pt3D::ORIGIN,
                    right_point: Pt3D::new(0.0, -3.5, 0.0),
                },
                RefRoad {
                    link: LinkRoad::new(RoadID(1), RoadEnd::Start, Direction::Forward),
                    along_vec: -east,
                    left_point: Pt3D::new(5.0, 0.0, 0.0),
                    right_point: Pt3D::new(5.0, -3.5, 0.0),
                },
            ],
            enable_close_point: true,
            is_multiple_road: false,
            edge_segments: 30,
        }
    }

    fn links_req() -> LaneLinkRequest {
        LaneLinkRequest {
            lane_infos: Vec::new(),
            previous: Vec::new(),
            sample_segments: 20,
        }
    }

    #[test]
    fn dispatch_and_wait() {
        let mut pool = ExecutionPool::new(3);
        let version = pool.dispatch(JunctionID(0), boundary_req(), links_req());
        let update = pool.wait_for(JunctionID(0), version).unwrap();
        assert_eq!(update.junction, JunctionID(0));
        assert_eq!(update.geo_attr.unwrap().unwrap().num_triangles(), 60);
        assert!(update.lane_links.unwrap().is_empty());
        assert!(pool.try_finished().is_empty());
    }

    #[test]
    fn stale_results_are_dropped() {
        let mut pool = ExecutionPool::new(2);
        let old = pool.dispatch(JunctionID(3), boundary_req(), links_req());
        let mut req = boundary_req();
        req.ref_roads.pop();
        let new = pool.dispatch(JunctionID(3), req, links_req());
        assert!(new > old);
        assert!(pool.wait_for(JunctionID(3), old).is_none());

        let update = pool.wait_for(JunctionID(3), new).unwrap();
        assert_eq!(update.geo_attr.unwrap(), None);

        // Results for other junctions waiting meanwhile aren't lost
        let other = pool.dispatch(JunctionID(4), boundary_req(), links_req());
        let again = pool.dispatch(JunctionID(5), boundary_req(), links_req());
        assert!(pool.wait_for(JunctionID(5), again).is_some());
        let mut finished = Vec::new();
        while finished.is_empty() {
            finished = pool.try_finished();
        }
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].version, other);
    }

    #[test]
    fn invalidated_work_never_lands() {
        let mut pool = ExecutionPool::new(1);
        let version = pool.dispatch(JunctionID(1), boundary_req(), links_req());
        pool.invalidate(JunctionID(1));
        assert!(!pool.is_current(JunctionID(1), version));
        assert!(pool.wait_for(JunctionID(1), version).is_none());
        assert!(pool.try_finished().is_empty());
        assert_eq!(pool.num_tracked(), 0);

        // A later dispatch for the same junction still works
        let again = pool.dispatch(JunctionID(1), boundary_req(), links_req());
        assert!(again > version);
        assert_eq!(pool.num_tracked(), 1);
        assert!(pool.wait_for(JunctionID(1), again).is_some());
    }

    #[test]
    fn panics_become_errors() {
        let output = contain_panics(|| panic!("boom"));
        assert_eq!(
            unpack_boundary(output).unwrap_err().to_string(),
            "kernel panicked: boom"
        );
        assert!(contain_panics(|| Ok(TaskOutput::LaneLinks(Vec::new()))).is_ok());
    }
}
