use super::*;

/// Everything sessions need from one template publication: the template, its
/// precomputed merkle branches, and the job id the registry allocated for it.
/// Immutable once broadcast.
#[derive(Clone, Debug)]
pub struct Workbase {
    pub template: BlockTemplate,
    pub merkle_branches: Vec<MerkleNode>,
    pub job_id: JobId,
    pub ntime: Ntime,
    pub clean_jobs: bool,
}

impl Workbase {
    pub fn new(template: BlockTemplate, job_id: JobId, clean_jobs: bool) -> Self {
        let merkle_branches = stratum::merkle_branches(&template.txids());
        let ntime = Ntime::try_from(template.current_time).unwrap_or_else(|_| {
            // A u32 ntime lasts until 2106; clamp rather than refuse to mine.
            Ntime::from(u32::MAX)
        });

        Self {
            template,
            merkle_branches,
            job_id,
            ntime,
            clean_jobs,
        }
    }

    pub fn prevhash(&self) -> PrevHash {
        PrevHash::from(self.template.previous_block_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branches_cover_template_transactions() {
        let workbase = Workbase::new(BlockTemplate::default(), JobId::new(0), true);
        assert!(workbase.merkle_branches.is_empty());
        assert_eq!(workbase.ntime, Ntime::from(1231006505));
    }

    #[test]
    fn oversized_curtime_clamps() {
        let template = BlockTemplate {
            current_time: u64::from(u32::MAX) + 10,
            ..BlockTemplate::default()
        };
        let workbase = Workbase::new(template, JobId::new(0), true);
        assert_eq!(workbase.ntime, Ntime::from(u32::MAX));
    }

    #[test]
    fn prevhash_mirrors_template() {
        let template = BlockTemplate {
            previous_block_hash: BlockHash::from_byte_array([9; 32]),
            ..BlockTemplate::default()
        };
        let workbase = Workbase::new(template.clone(), JobId::new(1), false);
        assert_eq!(
            BlockHash::from(workbase.prevhash()),
            template.previous_block_hash
        );
    }
}
